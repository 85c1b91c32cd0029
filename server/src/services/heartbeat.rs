//! Dead-connection detection.
//!
//! Each connection owns one [`Heartbeat`]. On every interval tick the
//! connection is presumed dead before it is pinged; only a pong brings it
//! back. A connection still presumed dead at the next tick missed a full
//! interval and is reaped through the normal disconnect path.

/// What the connection loop should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    Ping,
    Reap,
}

#[derive(Debug)]
pub struct Heartbeat {
    alive: bool,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

impl Heartbeat {
    #[must_use]
    pub fn new() -> Self {
        Self { alive: true }
    }

    pub fn tick(&mut self) -> Beat {
        if !self.alive {
            return Beat::Reap;
        }
        self.alive = false;
        Beat::Ping
    }

    pub fn pong(&mut self) {
        self.alive = true;
    }
}
