//! Types for use when configuring slotcast modules.

use crate::*;
use std::sync::Mutex;

/// Denotes a type used to configure a specific slotcast module.
///
/// A module config is serialized as a json object with a single camelCase
/// top-level key naming the module, e.g. `{"coreScanner": {...}}`. The
/// type must be `#[serde(default)]` tolerant: configs are loaded from disk
/// and can be edited by humans, so missing properties fall back to sane
/// defaults and unknown properties are ignored.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

impl<T> ModConfig for T where
    T: 'static
        + Sized
        + Default
        + std::fmt::Debug
        + serde::Serialize
        + serde::de::DeserializeOwned
        + Send
        + Sync
{
}

/// Slotcast configuration.
///
/// This is a single json object shared by all modules. It lives inside
/// the [Builder], which is usually frozen in an `Arc`, so module configs
/// are set and read through a shared reference.
#[derive(Debug, Default)]
pub struct Config(Mutex<serde_json::Map<String, serde_json::Value>>);

impl serde::Serialize for Config {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.lock().unwrap().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map: serde_json::Map<String, serde_json::Value> =
            serde::Deserialize::deserialize(deserializer)?;
        Ok(Self(Mutex::new(map)))
    }
}

impl Config {
    /// Merge a module config into this config. Top-level keys of the
    /// module config replace existing keys of the same name.
    pub fn set_module_config<M: ModConfig>(
        &self,
        module: &M,
    ) -> CastResult<()> {
        let value = serde_json::to_value(module)
            .map_err(|e| CastError::other_src("encode module config", e))?;
        let serde_json::Value::Object(map) = value else {
            return Err(CastError::other(
                "module config must serialize to a json object",
            ));
        };
        self.0.lock().unwrap().extend(map);
        Ok(())
    }

    /// Extract a module config. Any keys that do not belong to the module
    /// are ignored, any keys that are missing get their default.
    pub fn get_module_config<M: ModConfig>(&self) -> CastResult<M> {
        let map = self.0.lock().unwrap().clone();
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| CastError::other_src("decode module config", e))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct ModA {
        p_a: u32,
        p_b: String,
    }

    impl Default for ModA {
        fn default() -> Self {
            Self {
                p_a: 7,
                p_b: "dflt".into(),
            }
        }
    }

    #[derive(Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct ModAModConfig {
        mod_a: ModA,
    }

    #[derive(Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct ModBModConfig {
        mod_b: u64,
    }

    #[test]
    fn config_usage_example() {
        let config = Config::default();
        config
            .set_module_config(&ModAModConfig::default())
            .unwrap();
        config
            .set_module_config(&ModBModConfig { mod_b: 42 })
            .unwrap();

        assert_eq!(
            r#"{"modA":{"pA":7,"pB":"dflt"},"modB":42}"#,
            serde_json::to_string(&config).unwrap()
        );

        assert_eq!(
            ModBModConfig { mod_b: 42 },
            config.get_module_config().unwrap()
        );
    }

    #[test]
    fn load_partial_config_from_disk() {
        let config: Config = serde_json::from_str(
            r#"{
              "modBAD": { "foo": "bar" },
              "modA": { "pB": "from-disk" }
            }"#,
        )
        .unwrap();

        assert_eq!(
            ModAModConfig {
                mod_a: ModA {
                    p_a: 7,
                    p_b: "from-disk".into(),
                },
            },
            config.get_module_config().unwrap()
        );

        // unset mods get the default
        assert_eq!(
            ModBModConfig::default(),
            config.get_module_config().unwrap()
        );
    }
}
