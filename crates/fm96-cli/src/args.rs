//! Command-line flags and their merge onto the config file.

use clap::Parser;
use fm96_config::{ConfigError, EncoderConfig, sample_rate_from_i64};
use std::path::PathBuf;

/// FM stereo MPX encoder.
///
/// Reads stereo audio, applies preemphasis and a 15 kHz lowpass, and writes
/// the composite baseband signal (L+R, 19 kHz pilot, L-R on 38 kHz) to an
/// audio sink for an FM modulator.
#[derive(Parser, Debug)]
#[command(name = "fm96", version, disable_version_flag = true)]
pub struct Cli {
    /// Stereo encoding: 1 to enable, 0 for mono [default: 1]
    #[arg(short = 's', long, value_name = "0|1", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub stereo: Option<u8>,

    /// Processing sample rate in Hz [default: 192000]
    #[arg(short = 'S', long = "sample_rate", value_name = "HZ", allow_negative_numbers = true)]
    pub sample_rate: Option<i64>,

    /// Stereo audio source: `default`, `file:<path>` or a device name [default: default]
    #[arg(short, long, value_name = "PORT")]
    pub input: Option<String>,

    /// Composite output sink: `default`, `file:<path>` or a device name [default: default]
    #[arg(short, long, value_name = "PORT")]
    pub output: Option<String>,

    /// Mono source mixed into the composite, e.g. an RDS generator
    #[arg(short, long, value_name = "PORT")]
    pub mpx: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// List audio devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Print version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: (),
}

impl Cli {
    /// Load the config file (if any), apply flag overrides and validate.
    pub fn resolve(&self) -> Result<EncoderConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EncoderConfig::load(path)?,
            None => EncoderConfig::default(),
        };

        if let Some(stereo) = self.stereo {
            config.stereo = stereo == 1;
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = sample_rate_from_i64(rate)?;
        }
        if let Some(input) = &self.input {
            config.input = input.parse()?;
        }
        if let Some(output) = &self.output {
            config.output = output.parse()?;
        }
        if let Some(mpx) = &self.mpx {
            config.mpx = Some(mpx.parse()?);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;
    use fm96_config::{PortId, ValidationError};
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fm96").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_gives_defaults() {
        let config = parse(&[]).resolve().unwrap();
        assert_eq!(config, EncoderConfig::default());
    }

    #[test]
    fn short_flags() {
        let cli = parse(&["-s", "0", "-S", "96000", "-i", "file:a.wav", "-o", "Speakers", "-m", "rds"]);
        let config = cli.resolve().unwrap();
        assert!(!config.stereo);
        assert_eq!(config.sample_rate, 96_000);
        assert_eq!(config.input, PortId::File(PathBuf::from("a.wav")));
        assert_eq!(config.output, PortId::Device("Speakers".to_string()));
        assert_eq!(config.mpx, Some(PortId::Device("rds".to_string())));
    }

    #[test]
    fn long_flags() {
        let cli = parse(&["--stereo", "1", "--sample_rate", "228000", "--output", "file:out.wav"]);
        let config = cli.resolve().unwrap();
        assert!(config.stereo);
        assert_eq!(config.sample_rate, 228_000);
        assert!(config.output.is_file());
    }

    #[test]
    fn stereo_accepts_only_zero_or_one() {
        let err = Cli::try_parse_from(["fm96", "-s", "2"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn version_flag() {
        let err = Cli::try_parse_from(["fm96", "-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn negative_sample_rate_is_a_config_error() {
        let err = parse(&["-S", "-48000"]).resolve().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::InvalidSampleRate(-48000))
        ));
    }

    #[test]
    fn zero_sample_rate_is_a_config_error() {
        let err = parse(&["-S", "0"]).resolve().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn empty_port_is_a_config_error() {
        let err = parse(&["-o", ""]).resolve().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::InvalidPortId { .. })
        ));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fm96.toml");
        std::fs::write(
            &path,
            "stereo = false\nsample_rate = 96000\noutput = \"file:file.wav\"\n",
        )
        .unwrap();

        let cli = parse(&["-c", path.to_str().unwrap(), "-o", "file:flag.wav"]);
        let config = cli.resolve().unwrap();
        assert!(!config.stereo);
        assert_eq!(config.sample_rate, 96_000);
        assert_eq!(config.output, PortId::File(PathBuf::from("flag.wav")));
    }

    #[test]
    fn override_is_validated_against_file_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fm96.toml");
        std::fs::write(&path, "stereo = false\nsample_rate = 48000\n").unwrap();

        // Fine in mono, too low once stereo is switched on
        let cli = parse(&["-c", path.to_str().unwrap(), "-s", "1"]);
        assert!(matches!(
            cli.resolve().unwrap_err(),
            ConfigError::Validation(ValidationError::SampleRateTooLow { .. })
        ));
    }
}
