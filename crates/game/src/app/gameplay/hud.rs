use std::cell::Cell;
use std::rc::Rc;

use runner_engine::Subscription;

use super::events::{GameEvent, Topic};
use super::state::{ConfigKey, ConfigValue, RoundPhase, StateStore};

#[derive(Debug, Clone, Copy, PartialEq)]
struct HudValues {
    score: i64,
    velocity_scale: f32,
    started: bool,
    paused: bool,
}

impl HudValues {
    fn phase(self) -> RoundPhase {
        RoundPhase::from_flags(self.started, self.paused)
    }
}

/// Status line kept current from configuration change events alone.
pub struct Hud {
    values: Rc<Cell<HudValues>>,
    _config_subscription: Subscription<GameEvent>,
}

impl Hud {
    pub fn new(store: &StateStore) -> Self {
        let values = Rc::new(Cell::new(HudValues {
            score: store.score(),
            velocity_scale: store.velocity_scale(),
            started: store.is_started(),
            paused: store.is_paused(),
        }));
        let handler_values = Rc::clone(&values);
        let config_subscription =
            store
                .bus()
                .subscribe_scoped(Topic::ConfigurationChanged, move |event| {
                    let GameEvent::ConfigurationChanged { key, value } = event else {
                        return Ok(());
                    };
                    let mut values = handler_values.get();
                    match key {
                        ConfigKey::Score => {
                            if let ConfigValue::Int(score) = value {
                                values.score = *score;
                            }
                        }
                        ConfigKey::VelocityScale => {
                            if let Some(scale) = value.as_f32() {
                                values.velocity_scale = scale;
                            }
                        }
                        ConfigKey::Start => {
                            if let Some(started) = value.as_bool() {
                                values.started = started;
                            }
                        }
                        ConfigKey::Paused => {
                            if let Some(paused) = value.as_bool() {
                                values.paused = paused;
                            }
                        }
                        _ => return Ok(()),
                    }
                    handler_values.set(values);
                    Ok(())
                });
        Self {
            values,
            _config_subscription: config_subscription,
        }
    }

    pub fn score_label(&self) -> String {
        format_score(self.values.get().score)
    }

    pub fn text(&self) -> String {
        let values = self.values.get();
        let status = match values.phase() {
            RoundPhase::NotStarted => "Ready",
            RoundPhase::Running => "Running",
            RoundPhase::Paused => "Paused",
        };
        format!(
            "Score {} | x{:.2} | {}",
            format_score(values.score),
            values.velocity_scale,
            status
        )
    }
}

fn format_score(score: i64) -> String {
    if score < 10 {
        format!("0{score}")
    } else {
        score.to_string()
    }
}
