use mongodb::options::{ClientOptions, Credential};
use serde::{Deserialize, Deserializer};
use std::fmt::{Debug, Formatter};

pub const DEFAULT_PORT: u16 = 27017;
pub const SRV_PROTOCOL: &str = "mongodb+srv";
pub const APP_NAME: &str = "backlog-backend";

/// Connection settings, as found under the `mongodb` key of the config file.
#[derive(Clone, Eq, PartialEq, Deserialize)]
pub struct MongoConfig {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub host: String,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
}

fn default_protocol() -> String {
    "mongodb".to_owned()
}

/// Ports show up both as numbers and as quoted strings in config files.
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Option::<Port>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Port::Number(port)) => Ok(Some(port)),
        Some(Port::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Port::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl MongoConfig {
    /// The connection string, without credentials.
    ///
    /// SRV records carry their own ports and topology, so neither the port
    /// nor `directConnection` is added for them.
    #[must_use]
    pub fn uri(&self) -> String {
        if self.protocol == SRV_PROTOCOL {
            format!("{}://{}/", self.protocol, self.host)
        } else {
            let port = self.port.unwrap_or(DEFAULT_PORT);
            format!(
                "{}://{}:{port}/?directConnection=true",
                self.protocol, self.host
            )
        }
    }

    pub async fn client_options(&self) -> mongodb::error::Result<ClientOptions> {
        let mut options = ClientOptions::parse(self.uri()).await?;

        if let Some(username) = &self.username
            && !username.is_empty()
        {
            options.credential = Some(
                Credential::builder()
                    .username(username.clone())
                    .password(self.password.clone())
                    .build(),
            );
        }
        options.app_name = Some(APP_NAME.to_owned());

        Ok(options)
    }
}

impl Debug for MongoConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoConfig")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MongoConfig;

    fn config(protocol: &str, port: Option<u16>) -> MongoConfig {
        MongoConfig {
            protocol: protocol.to_owned(),
            host: "db.internal".to_owned(),
            port,
            username: Some("backlog".to_owned()),
            password: Some("hunter2".to_owned()),
            database: "backlog".to_owned(),
        }
    }

    #[test]
    fn uri_never_contains_credentials() {
        let uri = config("mongodb", Some(27018)).uri();
        assert_eq!(uri, "mongodb://db.internal:27018/?directConnection=true");
        assert!(!uri.contains("hunter2"));
    }

    #[test]
    fn uri_defaults_port() {
        assert_eq!(
            config("mongodb", None).uri(),
            "mongodb://db.internal:27017/?directConnection=true"
        );
    }

    #[test]
    fn srv_uri_has_no_port() {
        assert_eq!(
            config("mongodb+srv", Some(27017)).uri(),
            "mongodb+srv://db.internal/"
        );
    }

    #[test]
    fn debug_redacts_password() {
        let debug = format!("{:?}", config("mongodb", None));
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn port_accepts_numbers_and_strings() {
        let from_number: MongoConfig =
            serde_json::from_str(r#"{"host":"h","port":27017,"database":"d"}"#).unwrap();
        let from_string: MongoConfig =
            serde_json::from_str(r#"{"host":"h","port":"27017","database":"d"}"#).unwrap();
        let missing: MongoConfig = serde_json::from_str(r#"{"host":"h","database":"d"}"#).unwrap();

        assert_eq!(from_number.port, Some(27017));
        assert_eq!(from_string.port, Some(27017));
        assert_eq!(missing.port, None);
        assert_eq!(missing.protocol, "mongodb");
        assert!(serde_json::from_str::<MongoConfig>(r#"{"host":"h","port":"x","database":"d"}"#).is_err());
    }

    #[tokio::test]
    async fn client_options_carry_credentials() {
        let options = config("mongodb", None).client_options().await.unwrap();

        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("backlog"));
        assert_eq!(credential.password.as_deref(), Some("hunter2"));
        assert_eq!(options.direct_connection, Some(true));
    }
}
