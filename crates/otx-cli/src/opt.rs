use std::path::PathBuf;

use clap::Parser;

use crate::commands::SubCmd;

#[derive(Parser, Debug)]
#[command(name = "otx", author, version, about = "Offchain token transfers", long_about = None)]
pub(crate) struct Opt {
    /// Configuration file.
    ///
    /// Defaults to $OTX_HOME/config.toml, then ~/.otx/config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Aggregator JSON-RPC endpoint, overriding the configuration file.
    #[arg(long, global = true, env = "OTX_AGGREGATOR_URL")]
    pub aggregator_url: Option<String>,

    /// Trust base JSON file, overriding the configuration file.
    #[arg(long, global = true)]
    pub trust_base: Option<PathBuf>,

    /// Available sub commands.
    #[command(subcommand)]
    pub command: SubCmd,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition() {
        Opt::command().debug_assert();
    }

    #[test]
    fn test_parse_verify() {
        let opt = Opt::try_parse_from([
            "otx",
            "verify",
            "token.json",
            "--check-spent",
            "--trust-base",
            "tb.json",
        ])
        .expect("parse");
        assert_eq!(opt.trust_base, Some(PathBuf::from("tb.json")));
        match opt.command {
            SubCmd::Verify(args) => {
                assert!(args.check_spent);
                assert_eq!(args.file, PathBuf::from("token.json"));
            }
            other => unreachable!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_data_flags_conflict() {
        let result = Opt::try_parse_from([
            "otx", "mint", "--secret", "s", "--out", "t.json", "--data", "a", "--data-hex", "00",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_receive_with_withheld_data() {
        let opt = Opt::try_parse_from([
            "otx", "receive", "t.json", "--secret", "s", "--data-hex", "0a0b", "--out", "o.json",
        ])
        .expect("parse");
        match opt.command {
            SubCmd::Receive(args) => {
                assert_eq!(args.data.bytes().expect("hex"), Some(vec![0x0a, 0x0b]));
                assert!(!args.offline);
            }
            other => unreachable!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bad_address_is_rejected() {
        let result = Opt::try_parse_from([
            "otx", "send", "t.json", "--secret", "s", "--to", "DIRECT://zz", "--out", "o.json",
        ]);
        assert!(result.is_err());
    }
}
