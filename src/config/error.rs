use std::path::PathBuf;

/// Фатальные ошибки конфигурации. У каждого вида свой код завершения процесса.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("wrong SNMP connection string '{0}'")]
    SnmpConnectionString(String),

    #[error("wrong SNMP port '{0}'")]
    SnmpPort(String),

    #[error("wrong poll interval '{0}' at configuration file")]
    Interval(String),

    #[error("missing SNMP OID at configuration file")]
    MissingOid,

    #[error("wrong IoT Hub connection string: {0}")]
    IotHubConnectionString(String),

    #[error("could not read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("wrong SNMP address '{0}'")]
    SnmpAddress(String),

    #[error("wrong {name} value '{value}'")]
    InvalidSetting { name: &'static str, value: String },
}

/// Код завершения, если мост упал уже после запуска (например, C2D-канал закрыт).
/// Не пересекается с кодами [`ConfigError::exit_code`].
pub const RUNTIME_FAILURE_EXIT_CODE: i32 = 9;

impl ConfigError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::SnmpConnectionString(_) => 1,
            ConfigError::SnmpPort(_) => 2,
            ConfigError::Interval(_) => 3,
            ConfigError::MissingOid => 4,
            ConfigError::IotHubConnectionString(_) => 5,
            ConfigError::Read { .. } | ConfigError::Parse { .. } => 6,
            ConfigError::SnmpAddress(_) => 7,
            ConfigError::InvalidSetting { .. } => 8,
        }
    }
}
