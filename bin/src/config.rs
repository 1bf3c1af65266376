//! cli configs

pub mod cli {
    //! Parse from either cli or env var

    /// default log level. Can use this argument or INTEGRESQL_LOG env var
    pub const DEFAULT_INTEGRESQL_LOG: &str = "info";

    use std::path::PathBuf;

    use anyhow::{Result, bail};
    pub use clap::Parser;
    use clap::{Args, Subcommand, ValueEnum};
    use integresql_client::{
        ClientConfig, TemplateHash,
        config::{DEFAULT_API_VERSION, DEFAULT_BASE_URL, ENV_API_VERSION, ENV_BASE_URL},
    };

    #[derive(Parser, Debug, Clone, PartialEq, Eq)]
    #[clap(author, name = "integresql", bin_name = "integresql", about, long_about = None)]
    /// talk to an IntegreSQL service from the shell
    pub struct Config {
        /// base url of the service, without the api version
        #[clap(long, env = ENV_BASE_URL, default_value = DEFAULT_BASE_URL)]
        pub base_url: String,
        /// api version path segment
        #[clap(long, env = ENV_API_VERSION, default_value = DEFAULT_API_VERSION)]
        pub api_version: String,
        /// set the log level. All valid RUST_LOG arguments are accepted
        #[clap(long, env, default_value = DEFAULT_INTEGRESQL_LOG)]
        pub integresql_log: String,
        /// log format, logs always go to stderr
        #[clap(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Standard)]
        pub log_format: LogFormat,
        #[clap(subcommand)]
        pub command: Command,
    }

    impl Config {
        pub fn client_config(&self) -> ClientConfig {
            ClientConfig::new(&self.base_url, &self.api_version)
        }
    }

    #[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LogFormat {
        Standard,
        Json,
        Pretty,
    }

    #[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
    pub enum Command {
        /// print the template hash of one or more directories
        Hash {
            #[clap(required = true)]
            dirs: Vec<PathBuf>,
        },
        /// register a template, prints the template database if this call owns it
        Initialize(TemplateArgs),
        /// mark a template ready for test databases
        Finalize(TemplateArgs),
        /// drop a template and its test databases
        Discard(TemplateArgs),
        /// lease a test database and print it
        Open(TemplateArgs),
        /// recreate a leased test database and return it to the pool
        Recreate(LeaseArgs),
        /// return a leased test database to the pool as is
        Unlock(LeaseArgs),
        /// return a leased test database the test did not write to
        MarkUnmodified(LeaseArgs),
        /// forget every template and test database
        Reset,
    }

    #[derive(Args, Debug, Clone, PartialEq, Eq)]
    pub struct TemplateArgs {
        /// template hash, computed from DIRS when not given
        #[clap(long, conflicts_with = "dirs")]
        pub hash: Option<TemplateHash>,
        /// template directories, hashed in the order given
        pub dirs: Vec<PathBuf>,
    }

    impl TemplateArgs {
        pub fn template_hash(&self) -> Result<TemplateHash> {
            match &self.hash {
                Some(hash) => Ok(hash.clone()),
                None if self.dirs.is_empty() => {
                    bail!("either --hash or template directories required")
                }
                None => Ok(TemplateHash::from_dirs(&self.dirs)?),
            }
        }
    }

    #[derive(Args, Debug, Clone, PartialEq, Eq)]
    pub struct LeaseArgs {
        /// id of the leased test database
        #[clap(long)]
        pub id: i64,
        #[clap(flatten)]
        pub template: TemplateArgs,
    }
}

pub mod trace {
    //! tracing configuration
    use anyhow::Result;
    use tracing_subscriber::{
        filter::EnvFilter,
        fmt::{
            self,
            format::{Format, PrettyFields},
        },
        prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    use super::cli::LogFormat;

    /// Installed logging setup
    #[derive(Debug)]
    pub struct Config {
        /// formatting applied to logs
        pub log_frmt: LogFormat,
    }

    impl Config {
        /// Install the global subscriber, writing to stderr
        pub fn parse(integresql_log: &str, log_frmt: LogFormat) -> Result<Self> {
            let filter = EnvFilter::try_new(integresql_log)
                .or_else(|_| EnvFilter::try_new("info"))?
                .add_directive("hyper=off".parse()?);

            match log_frmt {
                LogFormat::Json => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json().with_writer(std::io::stderr))
                        .init();
                }
                LogFormat::Pretty => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(
                            fmt::layer()
                                .event_format(
                                    Format::default().pretty().with_source_location(false),
                                )
                                .fmt_fields(PrettyFields::new())
                                .with_writer(std::io::stderr),
                        )
                        .init();
                }
                LogFormat::Standard => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().with_writer(std::io::stderr))
                        .init();
                }
            }

            Ok(Self { log_frmt })
        }
    }
}
