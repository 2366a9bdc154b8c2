use crate::error::Error;
use crate::Generator;
use linktrack_core::shortcode::{MAX_LENGTH, MIN_LENGTH};
use linktrack_core::ShortCode;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use typed_builder::TypedBuilder;

/// Upper- and lower-case ASCII letters followed by the digits.
pub const DEFAULT_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
pub const DEFAULT_LENGTH: usize = 6;

/// Configures a [`RandomGenerator`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct GeneratorSettings {
    /// Number of characters per code.
    #[builder(default = DEFAULT_LENGTH)]
    pub length: usize,
    /// Characters codes are drawn from, uniformly and independently.
    #[builder(default = DEFAULT_ALPHABET.to_string(), setter(into))]
    pub alphabet: String,
    /// Fixed seed for reproducible sequences. Seeded from OS entropy if unset.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
}

/// Draws fixed-length codes uniformly from an alphabet.
///
/// With the defaults the space is 62^6, about 5.7 * 10^10 codes.
#[derive(Debug)]
pub struct RandomGenerator {
    alphabet: Vec<char>,
    length: usize,
    rng: Mutex<StdRng>,
}

impl RandomGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, Error> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&settings.length) {
            return Err(Error::InvalidLength {
                length: settings.length,
                min: MIN_LENGTH,
                max: MAX_LENGTH,
            });
        }

        let alphabet: Vec<char> = settings.alphabet.chars().collect();
        if alphabet.is_empty() {
            return Err(Error::EmptyAlphabet);
        }
        if let Some(&bad) = alphabet
            .iter()
            .find(|c| !(c.is_ascii_alphanumeric() || **c == '-' || **c == '_'))
        {
            return Err(Error::InvalidAlphabet(bad));
        }

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            alphabet,
            length: settings.length,
            rng: Mutex::new(rng),
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> Self::Output {
        let mut rng = self.rng.lock();
        let code: String = (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect();
        ShortCode::new_unchecked(code)
    }

    fn space_size(&self) -> Option<u128> {
        Some((self.alphabet.len() as u128).saturating_pow(self.length as u32))
    }
}
