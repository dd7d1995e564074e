use enum_map::Enum;
use rand::Rng;
use std::fmt;
use std::io::{self, BufRead, Write};

pub const N_FACES: usize = 6;

/// One face of the die, identified 1 through 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum Face {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
}

impl Face {
    pub const ALL: [Face; N_FACES] = [
        Face::One,
        Face::Two,
        Face::Three,
        Face::Four,
        Face::Five,
        Face::Six,
    ];

    /// Draws a face uniformly at random.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..N_FACES)]
    }

    pub fn id(self) -> u8 {
        match self {
            Face::One => 1,
            Face::Two => 2,
            Face::Three => 3,
            Face::Four => 4,
            Face::Five => 5,
            Face::Six => 6,
        }
    }

    /// Pips as drawn on the die, used by the table view.
    pub fn glyph(self) -> char {
        match self {
            Face::One => '⚀',
            Face::Two => '⚁',
            Face::Three => '⚂',
            Face::Four => '⚃',
            Face::Five => '⚄',
            Face::Six => '⚅',
        }
    }
}

impl TryFrom<u8> for Face {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Face::One),
            2 => Ok(Face::Two),
            3 => Ok(Face::Three),
            4 => Ok(Face::Four),
            5 => Ok(Face::Five),
            6 => Ok(Face::Six),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.glyph(), self.id())
    }
}

/// Wraps `text` in the ANSI escape for `color`. Unknown colors pass through.
pub fn format_str(text: String, color: &str) -> String {
    let code = match color {
        "red" => "31",
        "green" => "32",
        "yellow" => "33",
        "blue" => "34",
        "magenta" => "35",
        "cyan" => "36",
        _ => return text,
    };
    format!("\x1b[{}m{}\x1b[0m", code, text)
}

/// Prints `prompt` and reads one trimmed line from stdin. `None` on EOF.
pub fn input(prompt: &str) -> io::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}
