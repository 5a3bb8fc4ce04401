//! Process exit statuses, after `sysexits.h`.

/// Graceful shutdown, on a signal or the idle timer.
pub const EX_OK: i32 = 0;
/// The command line was used incorrectly.
pub const EX_USAGE: i32 = 64;
/// The broker session could not be established.
pub const EX_UNAVAILABLE: i32 = 69;
/// The client reported an unrecoverable error.
pub const EX_SOFTWARE: i32 = 70;
/// The output sink could not be written.
pub const EX_IOERR: i32 = 74;
