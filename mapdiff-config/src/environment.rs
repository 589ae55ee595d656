use std::fmt;
use std::io;

/// Environment variable holding the environment name.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

const DEV_ENV_NAME: &str = "dev";

const PROD_ENV_NAME: &str = "prod";

/// Runtime environment, selecting which environment configuration file is layered on top of
/// the base file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    /// Reads the environment from `APP_ENVIRONMENT`, defaulting to [`Environment::Dev`].
    pub fn load() -> Result<Environment, io::Error> {
        match std::env::var(APP_ENVIRONMENT_ENV_NAME) {
            Ok(name) => name.parse(),
            Err(_) => Ok(Environment::Dev),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => DEV_ENV_NAME,
            Environment::Prod => PROD_ENV_NAME,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = io::Error;

    /// Parses `dev` or `prod`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            DEV_ENV_NAME => Ok(Environment::Dev),
            PROD_ENV_NAME => Ok(Environment::Prod),
            other => Err(io::Error::other(format!(
                "`{other}` is not a supported environment, expected `{DEV_ENV_NAME}` or `{PROD_ENV_NAME}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_environment_names_case_insensitively() {
        assert_eq!("DEV".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
