/// Identity of whoever drives the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
}

impl Credentials {
    pub const ROOT: Self = Self { uid: 0, gid: 0 };

    #[inline]
    pub fn is_superuser(&self) -> bool {
        self.uid == 0
    }
}

/// Per-session settings.
///
/// There is no wall clock without `std`, so the time source is injected:
/// it returns seconds since the epoch.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub credentials: Credentials,
    pub clock: fn() -> u32,
}

impl Config {
    pub fn new(credentials: Credentials, clock: fn() -> u32) -> Self {
        Self { credentials, clock }
    }

    #[inline]
    pub fn now(&self) -> u32 {
        (self.clock)()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::ROOT,
            clock: || 0,
        }
    }
}
