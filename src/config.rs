// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{path::Path, time::Duration};

use config::{Config, Environment, File};

use crate::samples::SamplerOptions;

mod audio;
mod error;
mod midi;
mod settings;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::midi::Midi;
pub use self::settings::Settings;

/// Prefix for environment variables that override the config file, e.g.
/// `PADSAMPLER_VOICES=32` or `PADSAMPLER_AUDIO__DEVICE=default`.
pub const ENV_PREFIX: &str = "PADSAMPLER";

/// Returns the environment source applied over the config file.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Loads the settings from the given YAML file, overlaid by the environment.
pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    Ok(Config::builder()
        .add_source(File::from(path))
        .add_source(environment())
        .build()?
        .try_deserialize::<Settings>()?)
}

/// Builds sampler options from the settings.
pub fn sampler_options(settings: &Settings) -> SamplerOptions {
    SamplerOptions {
        voices: settings.voices(),
        sample_rate: settings.audio().sample_rate(),
        event_queue: settings.event_queue(),
        one_shot: settings.one_shot(),
    }
}

/// Parses a duration string such as `300ms`.
pub(crate) fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    duration_string::DurationString::from_string(value.to_string())
        .map(Duration::from)
        .map_err(|e| ConfigError::Invalid(format!("invalid duration '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use config::FileFormat;

    use super::*;

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padsampler.yaml");
        std::fs::write(
            &path,
            r#"
            audio:
              device: mock-output
              sample_rate: 48000
            voices: 8
            "#,
        )
        .unwrap();

        let settings = load(&path).unwrap();
        assert_eq!(settings.audio().device(), "mock-output");
        assert_eq!(settings.voices(), 8);

        let options = sampler_options(&settings);
        assert_eq!(options.sample_rate, 48000);
        assert_eq!(options.voices, 8);
        assert!(options.one_shot);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load(Path::new("/nonexistent/padsampler.yaml")),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_environment_overrides_file() {
        let env: HashMap<String, String> = HashMap::from([
            ("PADSAMPLER_VOICES".to_string(), "32".to_string()),
            ("PADSAMPLER_ONE_SHOT".to_string(), "false".to_string()),
            ("PADSAMPLER_AUDIO__DEVICE".to_string(), "other".to_string()),
        ]);

        let settings: Settings = Config::builder()
            .add_source(File::from_str(
                "voices: 4\naudio:\n  device: first\n",
                FileFormat::Yaml,
            ))
            .add_source(environment().source(Some(env)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.voices(), 32);
        assert!(!settings.one_shot());
        assert_eq!(settings.audio().device(), "other");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("300ms").unwrap(),
            Duration::from_millis(300)
        );
        assert!(matches!(
            parse_duration("soon"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
