use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("PWM error: {0}")]
    Pwm(#[from] rppal::pwm::Error),

    #[error("Unsupported PWM channel: {0}")]
    UnsupportedChannel(u8),

    #[error("Invalid drive configuration: {0}")]
    Config(String),
}
