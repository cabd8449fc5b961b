//! Log output setup for binaries and tests embedding the coordinator

use tracing::Level;

/// Install a global `fmt` subscriber at `level`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Subscriber that writes through the test harness capture.
pub fn init_for_tests() -> bool {
    tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_test_writer()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_refused() {
        init(Level::DEBUG);
        assert!(!init(Level::INFO));
        assert!(!init_for_tests());
    }
}
