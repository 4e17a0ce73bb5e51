mod settings;

pub use settings::{DatabaseConfig, RunMode, Settings, TlsPolicy, VerifyConfig};
