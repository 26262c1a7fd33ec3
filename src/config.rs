use std::{collections::HashMap, env};

use anyhow::Context;

const DEFAULT_PORT: &str = "8000";
const DEFAULT_TOKEN: &str = "changeme";
const DEFAULT_TOPIC: &str = "features";

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
pub enum Parameter {
    Port,
    Token,
    Feed,
    Topic,
}

impl Parameter {
    pub fn deserialize(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "port" => Ok(Parameter::Port),
            "token" => Ok(Parameter::Token),
            "feed" => Ok(Parameter::Feed),
            "topic" => Ok(Parameter::Topic),
            _ => Err(anyhow::format_err!("unknown parameter {:?}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub token: String,
    pub feed_addr: String,
    pub topic: String,
}

impl Config {
    /// Builds the config from `--key value` argument pairs, falling back to
    /// the PORT, API_TOKEN, FEED_ADDR and FEED_TOPIC environment variables.
    pub fn load(args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut values = HashMap::new();
        let mut current_key = None;
        for arg in args {
            if let Some(current_key) = current_key.take() {
                values.insert(current_key, arg);
            } else if let Some(name) = arg.strip_prefix("--") {
                current_key = Some(Parameter::deserialize(name)?);
            } else {
                anyhow::bail!("invalid argument {:?}", arg);
            }
        }
        if let Some(key) = current_key {
            anyhow::bail!("missing value for parameter {:?}", key);
        }

        let port = values
            .remove(&Parameter::Port)
            .or_else(|| env::var("PORT").ok())
            .unwrap_or_else(|| DEFAULT_PORT.to_string())
            .parse::<u16>()
            .context("port must be a valid u16")?;

        let token = values
            .remove(&Parameter::Token)
            .or_else(|| env::var("API_TOKEN").ok())
            .unwrap_or_else(|| DEFAULT_TOKEN.to_string());

        let feed_addr = values
            .remove(&Parameter::Feed)
            .or_else(|| env::var("FEED_ADDR").ok())
            .context("a feed address is required (--feed <host:port> or FEED_ADDR)")?;

        let topic = values
            .remove(&Parameter::Topic)
            .or_else(|| env::var("FEED_TOPIC").ok())
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());

        Ok(Config {
            port,
            token,
            feed_addr,
            topic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    fn args<'a>(list: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
        list.iter().map(|s| s.to_string())
    }

    #[test]
    fn full_argument_list() {
        let config = Config::load(args(&[
            "--port", "9001", "--token", "secret", "--feed", "10.0.0.1:7000", "--topic", "hazards",
        ]))
        .unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.token, "secret");
        assert_eq!(config.feed_addr, "10.0.0.1:7000");
        assert_eq!(config.topic, "hazards");
    }

    #[test]
    fn unknown_parameter() {
        assert!(Config::load(args(&["--verbose", "yes"])).is_err());
    }

    #[test]
    fn dangling_parameter() {
        assert!(Config::load(args(&["--feed", "localhost:7000", "--port"])).is_err());
    }

    #[test]
    fn bare_argument() {
        assert!(Config::load(args(&["localhost:7000"])).is_err());
    }

    #[test]
    fn invalid_port() {
        assert!(Config::load(args(&["--feed", "localhost:7000", "--port", "70000"])).is_err());
    }
}
