// Subsystem lifecycle: spawn, respawn, destroy
pub mod deploy;

// Fleet upgrade and tracker maintenance
pub mod upgrade;
