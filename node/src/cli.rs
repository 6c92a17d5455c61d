//! # CLI Interface
//!
//! Every role binary takes exactly one argument: the port it binds on
//! `127.0.0.1` (§6.3). No flags, no subcommands — the rendezvous address
//! is fixed (see [`crate::rendezvous_address`]) and there is nothing else
//! to configure.

use clap::Parser;

/// A NOVA network role process.
#[derive(Parser, Debug)]
#[command(version, about, propagate_version = true)]
pub struct NodeArgs {
    /// Port to bind on 127.0.0.1.
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        NodeArgs::command().debug_assert();
    }

    #[test]
    fn parses_single_positional_port() {
        let args = NodeArgs::parse_from(["miner", "9000"]);
        assert_eq!(args.port, 9000);
    }
}
