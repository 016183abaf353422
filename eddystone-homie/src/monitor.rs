use log::debug;

/// A source of advertisements which can be turned on and off.
pub trait Scanner {
    type Error;

    async fn start(&mut self) -> Result<(), Self::Error>;

    async fn stop(&mut self) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanState {
    Stopped,
    Scanning,
}

/// Starts and stops a scanner, ignoring redundant requests.
#[derive(Debug)]
pub struct ScanController<S> {
    scanner: S,
    state: ScanState,
}

impl<S: Scanner> ScanController<S> {
    pub fn new(scanner: S) -> Self {
        Self {
            scanner,
            state: ScanState::Stopped,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Starts scanning, unless already scanning.
    pub async fn start(&mut self) -> Result<(), S::Error> {
        if self.state == ScanState::Scanning {
            debug!("start() called, but scanner is already running");
            return Ok(());
        }
        self.scanner.start().await?;
        self.state = ScanState::Scanning;
        Ok(())
    }

    /// Stops scanning, unless already stopped.
    pub async fn stop(&mut self) -> Result<(), S::Error> {
        if self.state == ScanState::Stopped {
            debug!("stop() called but scanner was not running");
            return Ok(());
        }
        debug!("Stopping...");
        self.scanner.stop().await?;
        debug!("Stopped");
        self.state = ScanState::Stopped;
        Ok(())
    }
}
