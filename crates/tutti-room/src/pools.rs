//! Random draws a room needs: its code, its categories, and each round's
//! letter.

use rand::Rng;
use rand::seq::IndexedRandom;
use tutti_protocol::RoomCode;

/// Letters a round may be played with. Hard ones (K, Q, W, X, Y) are left
/// out.
pub const LETTERS: &str = "ABCDEFGHIJLMNOPRSTUVZ";

/// Letter used once every letter has been played.
pub const FALLBACK_LETTER: char = 'A';

/// Categories every game has.
pub const STANDARD_CATEGORIES: [&str; 6] = [
    "Nombre",
    "Ciudad/País",
    "Animal",
    "Fruta/Vegetal",
    "Color",
    "Cosa",
];

/// Pool the per-game bonus categories are drawn from.
pub const BONUS_CATEGORIES: [&str; 10] = [
    "Excusa para cortar con tu ex",
    "Insulto de señora",
    "Lo que gritarías en una montaña rusa",
    "Razón para llegar tarde",
    "Nombre de banda de rock mediocre",
    "Algo que no debes decir en un funeral",
    "Título de película porno bajo presupuesto",
    "Comida que te da diarrea",
    "Lugar donde no deberías despertar",
    "Regalo terrible para un niño",
];

/// Bonus categories added to each game.
pub const BONUS_CATEGORY_COUNT: usize = 3;

/// Characters in a room code.
pub const ROOM_CODE_LEN: usize = 5;

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Source of the random parts of a game.
///
/// The registry holds one behind an `Arc` and shares it with every room
/// actor. Tests plug in a scripted implementation.
pub trait GamePools: Send + Sync + 'static {
    /// A candidate room code. The registry retries on collision.
    fn room_code(&self) -> RoomCode;

    /// The ordered category list for a new game.
    fn categories(&self) -> Vec<String>;

    /// A letter not in `used`, or [`FALLBACK_LETTER`] when none is left.
    fn letter(&self, used: &[char]) -> char;
}

/// [`GamePools`] backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPools;

impl GamePools for RandomPools {
    fn room_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| {
                let idx = rng.random_range(0..CODE_ALPHABET.len());
                CODE_ALPHABET[idx] as char
            })
            .collect::<String>();
        RoomCode(code)
    }

    fn categories(&self) -> Vec<String> {
        let mut rng = rand::rng();
        STANDARD_CATEGORIES
            .iter()
            .chain(BONUS_CATEGORIES.choose_multiple(&mut rng, BONUS_CATEGORY_COUNT))
            .map(|c| c.to_string())
            .collect()
    }

    fn letter(&self, used: &[char]) -> char {
        let available: Vec<char> =
            LETTERS.chars().filter(|c| !used.contains(c)).collect();
        available
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(FALLBACK_LETTER)
    }
}
