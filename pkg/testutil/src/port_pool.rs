use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static PORTS: Lazy<Mutex<PortPool>> = Lazy::new(|| Mutex::new(PortPool::new(13001..14001)));

/// Hands out local ports so parallel tests never bind the same one
pub struct PortPool {
    ports: BTreeSet<u16>,
}

impl PortPool {
    pub fn new(range: std::ops::Range<u16>) -> Self {
        Self {
            ports: range.collect(),
        }
    }

    pub fn get(&mut self) -> Option<u16> {
        self.ports.pop_first()
    }

    pub fn release(&mut self, port: u16) {
        self.ports.insert(port);
    }

    /// A port from the process-wide pool, returned to it when the guard drops
    pub fn lease() -> Port {
        let port = PORTS.lock().get().expect("no test ports left");
        Port(port)
    }
}

/// A leased port
#[derive(Debug)]
pub struct Port(u16);

impl Port {
    #[must_use]
    pub fn number(&self) -> u16 {
        self.0
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        PORTS.lock().release(self.0);
    }
}
