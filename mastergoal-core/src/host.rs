//! Shared client state for single-threaded hosts.
//!
//! In the browser, event handlers keep running while a request is suspended.
//! [`BoardHost`] therefore borrows the session only through `try_borrow_mut`,
//! so a second request made while one is in flight fails with
//! [`HostError::Busy`] instead of aborting. The controller is never borrowed
//! across an await or while the change hook runs, so board input stays live
//! during a request and the hook may call straight back into the host.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::SmallRng;
use tracing::warn;

use crate::controller::{BoardController, BoardView, Command};
use crate::coords::Orientation;
use crate::error::{HostError, SyncError};
use crate::gesture::PointerInput;
use crate::session::{
    Cosmetics, GameService, SessionConfig, SessionDescriptor, SessionStore, SessionSync,
};

type ChangeHook = Rc<dyn Fn(&BoardView)>;

pub struct BoardHost<S, T> {
    controller: RefCell<BoardController>,
    sync: RefCell<SessionSync<S, T>>,
    rng: RefCell<SmallRng>,
    clock: Box<dyn Fn() -> u64>,
    on_change: RefCell<Option<ChangeHook>>,
}

impl<S: GameService, T: SessionStore> BoardHost<S, T> {
    /// `clock` returns the current time in milliseconds.
    pub fn new(
        controller: BoardController,
        sync: SessionSync<S, T>,
        rng: SmallRng,
        clock: impl Fn() -> u64 + 'static,
    ) -> Self {
        Self {
            controller: RefCell::new(controller),
            sync: RefCell::new(sync),
            rng: RefCell::new(rng),
            clock: Box::new(clock),
            on_change: RefCell::new(None),
        }
    }

    #[inline]
    pub fn now(&self) -> u64 {
        (self.clock)()
    }

    /// Called with the new view after every visible change.
    pub fn set_on_change(&self, hook: impl Fn(&BoardView) + 'static) {
        let hook: ChangeHook = Rc::new(hook);
        *self.on_change.borrow_mut() = Some(hook);
    }

    pub fn notify(&self) {
        let Some(hook) = self.on_change.borrow().clone() else {
            return;
        };
        let view = self.controller.borrow().view();
        hook(&view);
    }

    pub fn view(&self) -> BoardView {
        self.controller.borrow().view()
    }

    /// A request currently holds the session.
    pub fn is_busy(&self) -> bool {
        self.sync.try_borrow_mut().is_err()
    }

    pub fn descriptor(&self) -> Result<Option<SessionDescriptor>, HostError> {
        let sync = self.sync.try_borrow().map_err(|_| HostError::Busy)?;
        Ok(sync.descriptor().cloned())
    }

    // -------------------------------------------------------------------------
    // Board input
    // -------------------------------------------------------------------------

    pub fn pointer(&self, input: PointerInput) -> Option<Command> {
        let now = self.now();
        let command = self.controller.borrow_mut().pointer(input, now);
        self.notify();
        command
    }

    pub fn tick(&self) -> Option<Command> {
        let now = self.now();
        let command = {
            let mut rng = self.rng.borrow_mut();
            self.controller.borrow_mut().tick(now, &mut *rng)
        };
        self.notify();
        command
    }

    pub fn dismiss_dialog(&self) -> Option<Command> {
        let command = self.controller.borrow_mut().dismiss_dialog();
        self.notify();
        command
    }

    pub fn set_modal_open(&self, open: bool) {
        self.controller.borrow_mut().set_modal_open(open);
        self.notify();
    }

    pub fn set_orientation(&self, orientation: Orientation) {
        self.controller.borrow_mut().set_orientation(orientation);
        self.notify();
    }

    /// Stop playback and the countdown.
    pub fn teardown(&self) {
        self.controller.borrow_mut().teardown();
    }

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// Resume the stored session. `false` when there is none.
    pub async fn resume(&self) -> Result<bool, HostError> {
        let descriptor = {
            let mut sync = self.sync.try_borrow_mut().map_err(|_| HostError::Busy)?;
            sync.resume()?.cloned()
        };
        let Some(descriptor) = descriptor else {
            return Ok(false);
        };
        {
            let mut controller = self.controller.borrow_mut();
            controller.configure(&descriptor.config);
            controller.set_orientation(Orientation::from_rotated(descriptor.cosmetics.rotated));
        }
        self.run(Command::Refetch).await;
        Ok(true)
    }

    pub async fn new_game(
        &self,
        config: SessionConfig,
        cosmetics: Cosmetics,
    ) -> Result<(), HostError> {
        let orientation = Orientation::from_rotated(cosmetics.rotated);
        let result = {
            let mut sync = self.sync.try_borrow_mut().map_err(|_| HostError::Busy)?;
            sync.create_session(config, cosmetics).await
        };
        let now = self.now();
        let follow_up = {
            let mut controller = self.controller.borrow_mut();
            controller.teardown();
            controller.set_orientation(orientation);
            controller.apply(result, now)
        };
        self.finish(follow_up).await;
        Ok(())
    }

    /// Same game id and settings, fresh board.
    pub async fn restart(&self) -> Result<(), HostError> {
        let result = {
            let mut sync = self.sync.try_borrow_mut().map_err(|_| HostError::Busy)?;
            sync.restart().await
        };
        let now = self.now();
        let follow_up = self.controller.borrow_mut().apply(result, now);
        self.finish(follow_up).await;
        Ok(())
    }

    /// Save new settings; rotation applies at once.
    pub fn update_settings(
        &self,
        config: SessionConfig,
        cosmetics: Cosmetics,
    ) -> Result<(), HostError> {
        let orientation = Orientation::from_rotated(cosmetics.rotated);
        self.sync
            .try_borrow_mut()
            .map_err(|_| HostError::Busy)?
            .update_settings(config, cosmetics)?;
        self.set_orientation(orientation);
        Ok(())
    }

    /// Forget the session and stop all board activity.
    pub fn leave(&self) -> Result<(), HostError> {
        {
            let mut sync = self.sync.try_borrow_mut().map_err(|_| HostError::Busy)?;
            self.controller.borrow_mut().teardown();
            sync.leave()?;
        }
        self.notify();
        Ok(())
    }

    /// Execute `command` and its follow-ups, publishing the view after each.
    pub async fn run(&self, command: Command) {
        let mut next = Some(command);
        while let Some(command) = next {
            let result = {
                let Ok(mut sync) = self.sync.try_borrow_mut() else {
                    warn!(?command, "session busy, dropping command");
                    let failure = Err(SyncError::Refused("request already in flight".to_string()));
                    let now = self.now();
                    self.controller.borrow_mut().apply(failure, now);
                    self.notify();
                    return;
                };
                sync.execute(command).await
            };
            let now = self.now();
            next = self.controller.borrow_mut().apply(result, now);
            self.notify();
        }
    }

    async fn finish(&self, follow_up: Option<Command>) {
        match follow_up {
            Some(command) => self.run(command).await,
            None => self.notify(),
        }
    }
}
