use std::cell::RefCell;
use std::rc::Rc;

use runner_engine::{
    InputAction, InputSnapshot, PrototypeDatabase, Scene, SceneCommand, SceneWorld, Vec2,
};
use tracing::{debug, info, warn};

use super::actor::{ActorState, CollisionKind};
use super::enemy::EnemyController;
use super::events::{EntityCategory, EntityHandle, GameBus};
use super::host::WorldFactory;
use super::hud::Hud;
use super::lifecycle::{EntityFactory, SharedFactory};
use super::player::{PlayerController, PlayerSpawner};
use super::spawner::SpawnScheduler;
use super::state::StateStore;
use super::{PlayArea, RunnerConfig};

struct PlayerSession {
    controller: PlayerController,
    grounded: bool,
}

/// Per-load wiring: the factory, spawners and live controllers.
struct Session {
    store: Rc<StateStore>,
    play_area: PlayArea,
    gravity: f32,
    jump_impulse: Vec2,
    factory: Rc<RefCell<WorldFactory>>,
    schedulers: Vec<SpawnScheduler>,
    player_spawner: PlayerSpawner,
    players: Vec<PlayerSession>,
    enemies: Vec<EnemyController>,
}

impl Session {
    fn handle_input(&mut self, input: &InputSnapshot) {
        if input.is_pressed(InputAction::Jump) {
            if self.store.is_started() {
                if let Some(player) = self.current_player() {
                    player.controller.jump();
                }
            } else {
                self.begin_round();
            }
        }
        if input.is_pressed(InputAction::Pause) {
            if let Err(err) = self.store.toggle_pause() {
                warn!(error = %err, "pause_toggle_failed");
            }
        }
    }

    fn begin_round(&mut self) {
        if self
            .players
            .iter()
            .any(|player| player.controller.state() == ActorState::Dying)
        {
            debug!("round_start_waiting_for_dying_player");
            return;
        }
        self.ensure_player();
        if let Err(err) = self.store.start_round() {
            warn!(error = %err, "round_start_failed");
        }
    }

    fn ensure_player(&mut self) {
        match self.player_spawner.ensure_player() {
            Ok(Some(_)) => self.sync_controllers(),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "player_spawn_failed"),
        }
    }

    fn current_player(&self) -> Option<&PlayerSession> {
        let current = self.player_spawner.current()?;
        self.players
            .iter()
            .find(|player| player.controller.handle() == current)
    }

    /// Builds controllers for freshly created entities and drops the ones
    /// whose entity the factory no longer owns.
    fn sync_controllers(&mut self) {
        let fresh = {
            let mut factory = self.factory.borrow_mut();
            factory
                .take_fresh()
                .into_iter()
                .map(|handle| {
                    let speed = factory
                        .prototype_of(handle)
                        .map(|prototype| prototype.speed)
                        .unwrap_or(0.0);
                    (handle, factory.body(handle.id), speed)
                })
                .collect::<Vec<_>>()
        };

        for (handle, body, speed) in fresh {
            match handle.category {
                EntityCategory::Player => self.players.push(PlayerSession {
                    controller: PlayerController::new(
                        handle,
                        body,
                        self.jump_impulse,
                        Rc::clone(&self.store),
                    ),
                    grounded: false,
                }),
                EntityCategory::Enemy => self.enemies.push(EnemyController::new(
                    handle,
                    body,
                    speed,
                    Rc::clone(&self.store),
                )),
            }
        }

        let factory = self.factory.borrow();
        self.players
            .retain(|player| factory.is_live(player.controller.handle()));
        self.enemies.retain(|enemy| factory.is_live(enemy.handle()));
    }

    fn step_bodies(&mut self, delta_seconds: f32, world: &mut SceneWorld) {
        for enemy in &self.enemies {
            if let Some(delta) = enemy.step(delta_seconds) {
                if let Some(entity) = world.find_entity_mut(enemy.handle().id) {
                    entity.transform.position += delta;
                }
            }
        }

        let floor_y = self.play_area.floor_y;
        for player in &mut self.players {
            let Some(entity) = world.find_entity_mut(player.controller.handle().id) else {
                continue;
            };
            if !entity.simulated {
                continue;
            }
            entity.velocity.y += self.gravity * delta_seconds;
            entity.transform.position += entity.velocity * delta_seconds;

            // Dying players fall through the floor and out of the play area.
            let half_height = entity.scaled_half_extents().y;
            let touching = player.controller.state().is_alive()
                && entity.velocity.y >= 0.0
                && entity.transform.position.y + half_height >= floor_y;
            if !touching {
                player.grounded = false;
                continue;
            }
            entity.transform.position.y = floor_y - half_height;
            entity.velocity.y = 0.0;
            if !player.grounded {
                player.grounded = true;
                player.controller.on_collision(CollisionKind::Floor);
            }
        }
    }

    fn resolve_collisions(&self, world: &SceneWorld) {
        if !self.store.is_running() {
            return;
        }
        let hit = self.players.iter().find(|player| {
            player.controller.state().is_alive()
                && world
                    .find_entity(player.controller.handle().id)
                    .is_some_and(|body| {
                        self.enemies.iter().any(|enemy| {
                            world
                                .find_entity(enemy.handle().id)
                                .is_some_and(|obstacle| body.overlaps(obstacle))
                        })
                    })
        });
        if let Some(player) = hit {
            player.controller.on_collision(CollisionKind::Obstacle);
        }
    }

    fn handle_exits(&mut self, world: &SceneWorld) {
        let bounds = self.play_area.bounds;
        let outside = |handle: EntityHandle| {
            world
                .find_entity(handle.id)
                .is_some_and(|entity| !bounds.contains(entity.transform.position))
        };

        let mut exited = Vec::new();
        for player in &self.players {
            let handle = player.controller.handle();
            if outside(handle) && player.controller.on_exited_play_area() {
                exited.push(handle);
            }
        }
        for enemy in &self.enemies {
            let handle = enemy.handle();
            if outside(handle) && enemy.on_exited_play_area() {
                exited.push(handle);
            }
        }
        if exited.is_empty() {
            return;
        }

        {
            let mut factory = self.factory.borrow_mut();
            for handle in &exited {
                factory.destroy(*handle);
            }
        }
        debug!(count = exited.len(), "entities_left_play_area");
        self.sync_controllers();
    }

    fn tracked_enemy_count(&self) -> usize {
        self.schedulers
            .iter()
            .map(|scheduler| scheduler.live_count())
            .sum()
    }
}

/// Endless-runner scene: one player, timer-driven obstacles, a score that
/// grows with survival time and a speed that grows with the score.
pub struct RunnerScene {
    config: RunnerConfig,
    prototypes: Rc<PrototypeDatabase>,
    max_live_entities: Option<usize>,
    store: Rc<StateStore>,
    hud: Hud,
    session: Option<Session>,
}

impl RunnerScene {
    pub fn new(
        config: RunnerConfig,
        prototypes: Rc<PrototypeDatabase>,
        max_live_entities: Option<usize>,
    ) -> Self {
        let store = Rc::new(StateStore::new(Rc::new(GameBus::new()), config.state));
        let hud = Hud::new(&store);
        Self {
            config,
            prototypes,
            max_live_entities,
            store,
            hud,
            session: None,
        }
    }

    pub fn store(&self) -> Rc<StateStore> {
        Rc::clone(&self.store)
    }

    pub fn hud(&self) -> &Hud {
        &self.hud
    }

    pub fn current_player_state(&self) -> Option<ActorState> {
        self.session
            .as_ref()?
            .current_player()
            .map(|player| player.controller.state())
    }

    pub fn tracked_enemy_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, Session::tracked_enemy_count)
    }

    pub fn spawn_intervals(&self) -> Vec<f32> {
        self.session.as_ref().map_or_else(Vec::new, |session| {
            session
                .schedulers
                .iter()
                .map(SpawnScheduler::spawn_interval)
                .collect()
        })
    }
}

impl Scene for RunnerScene {
    fn load(&mut self, world: &mut SceneWorld) {
        let factory = Rc::new(RefCell::new(WorldFactory::new(
            world.commands(),
            Rc::clone(&self.prototypes),
            self.max_live_entities,
        )));
        let shared: SharedFactory = factory.clone();
        let schedulers = self
            .config
            .spawn_points
            .iter()
            .enumerate()
            .map(|(index, settings)| {
                SpawnScheduler::new(
                    format!("spawn_point_{index}"),
                    settings.clone(),
                    Rc::clone(&self.store),
                    Rc::clone(&shared),
                )
            })
            .collect::<Vec<_>>();
        let player_spawner =
            PlayerSpawner::new(self.config.player.clone(), &self.store, Rc::clone(&shared));

        let mut session = Session {
            store: Rc::clone(&self.store),
            play_area: self.config.play_area,
            gravity: self.config.player.gravity,
            jump_impulse: self.config.player.jump_impulse,
            factory,
            schedulers,
            player_spawner,
            players: Vec::new(),
            enemies: Vec::new(),
        };
        if let Err(err) = self.store.reset_all() {
            warn!(error = %err, "state_reset_failed");
        }
        session.ensure_player();

        info!(
            spawn_points = session.schedulers.len(),
            prototypes = self.prototypes.len(),
            "runner_scene_loaded"
        );
        self.session = Some(session);
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }
        let Some(session) = self.session.as_mut() else {
            return SceneCommand::None;
        };

        session.handle_input(input);
        if let Err(err) = self.store.tick(fixed_dt_seconds) {
            warn!(error = %err, "state_tick_failed");
        }
        for scheduler in &session.schedulers {
            scheduler.tick(fixed_dt_seconds);
        }
        session.sync_controllers();
        session.step_bodies(fixed_dt_seconds, world);
        session.resolve_collisions(world);
        session.handle_exits(world);
        session.sync_controllers();

        SceneCommand::None
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        if let Some(session) = self.session.take() {
            session.factory.borrow_mut().forget_all();
        }
        info!(score = self.store.score(), "runner_scene_unloaded");
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        Some(self.hud.text())
    }
}
