//! Token and code tables for the controllable categories.
//!
//! Codes are the remote's button codes; they must stay bit-exact since the
//! transmitter sends them unchanged.

use std::fmt;

/// Independent axis of device control, one route per category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Raw,
    Brightness,
    Power,
    Function,
    Color,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Raw,
        Category::Brightness,
        Category::Power,
        Category::Function,
        Category::Color,
    ];

    /// Name used both as route segment and as POST argument name.
    pub const fn name(self) -> &'static str {
        match self {
            Category::Raw => "raw",
            Category::Brightness => "brightness",
            Category::Power => "power",
            Category::Function => "function",
            Category::Color => "color",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.strip_prefix('/')?;
        Self::ALL.into_iter().find(|category| category.name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bidirectional token/code lookup for one category.
pub trait CommandTable: Copy + Sized + 'static {
    const CATEGORY: Category;

    /// All variants in documentation order.
    const ALL: &'static [Self];

    fn token(self) -> &'static str;

    fn code(self) -> u8;

    /// Human readable name as printed in the raw code table.
    fn label(self) -> &'static str;

    /// Exact, case-sensitive match.
    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|entry| entry.token() == token)
    }

    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|entry| entry.code() == code)
    }
}

macro_rules! command_table {
    (
        $(#[$meta:meta])*
        $name:ident: $category:ident {
            $($variant:ident => ($token:literal, $code:literal, $label:literal),)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl CommandTable for $name {
            const CATEGORY: Category = Category::$category;
            const ALL: &'static [Self] = &[$(Self::$variant,)+];

            fn token(self) -> &'static str {
                match self {
                    $(Self::$variant => $token,)+
                }
            }

            fn code(self) -> u8 {
                match self {
                    $(Self::$variant => $code,)+
                }
            }

            fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.token())
            }
        }
    };
}

command_table! {
    /// Brightness step; while a function runs it changes transition speed instead.
    Brightness: Brightness {
        Up => ("up", 0x05, "Brightness-Up"),
        Down => ("down", 0x04, "Brightness-Down"),
    }
}

command_table! {
    Power: Power {
        On => ("on", 0x07, "On"),
        Off => ("off", 0x06, "Off"),
    }
}

command_table! {
    /// Special function modes. Selecting the active mode again switches to its
    /// alternate behavior.
    Function: Function {
        Flash => ("flash", 0x0F, "Flash"),
        Strobe => ("strobe", 0x17, "Strobe"),
        Fade => ("fade", 0x13, "Fade"),
        Smooth => ("smooth", 0x1B, "Smooth"),
    }
}

command_table! {
    /// Static colors.
    Color: Color {
        White => ("white", 0x0B, "White"),
        Red => ("red", 0x09, "Red"),
        Orange => ("orange", 0x0D, "Orange"),
        DarkYellow => ("dark-yellow", 0x11, "Dark-Yellow"),
        Yellow => ("yellow", 0x15, "Yellow"),
        LightYellow => ("light-yellow", 0x19, "Light-Yellow"),
        Green => ("green", 0x08, "Green"),
        PeaGreen => ("pea-green", 0x0C, "Pea-Green"),
        Cyan => ("cyan", 0x10, "Cyan"),
        LightBlue => ("light-blue", 0x14, "Light-Blue"),
        SkyBlue => ("sky-blue", 0x18, "Sky-Blue"),
        Blue => ("blue", 0x0A, "Blue"),
        DarkOrchid => ("dark-orchid", 0x0E, "Dark-Orchid"),
        Purple => ("purple", 0x1A, "Purple"),
        Magenta => ("magenta", 0x12, "Magenta"),
        Pink => ("pink", 0x16, "Pink"),
    }
}

/// Any table command. Every category command is a raw code underneath.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Brightness(Brightness),
    Power(Power),
    Function(Function),
    Color(Color),
}

impl Command {
    pub fn category(self) -> Category {
        match self {
            Command::Brightness(_) => Category::Brightness,
            Command::Power(_) => Category::Power,
            Command::Function(_) => Category::Function,
            Command::Color(_) => Category::Color,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Command::Brightness(entry) => entry.code(),
            Command::Power(entry) => entry.code(),
            Command::Function(entry) => entry.code(),
            Command::Color(entry) => entry.code(),
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Command::Brightness(entry) => entry.token(),
            Command::Power(entry) => entry.token(),
            Command::Function(entry) => entry.token(),
            Command::Color(entry) => entry.token(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Command::Brightness(entry) => entry.label(),
            Command::Power(entry) => entry.label(),
            Command::Function(entry) => entry.label(),
            Command::Color(entry) => entry.label(),
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Brightness::from_code(code)
            .map(Command::Brightness)
            .or_else(|| Power::from_code(code).map(Command::Power))
            .or_else(|| Function::from_code(code).map(Command::Function))
            .or_else(|| Color::from_code(code).map(Command::Color))
    }

    /// All table commands ordered by code.
    pub fn by_code() -> impl Iterator<Item = Command> {
        (u8::MIN..=u8::MAX).filter_map(Command::from_code)
    }
}

impl From<Brightness> for Command {
    fn from(value: Brightness) -> Self {
        Command::Brightness(value)
    }
}

impl From<Power> for Command {
    fn from(value: Power) -> Self {
        Command::Power(value)
    }
}

impl From<Function> for Command {
    fn from(value: Function) -> Self {
        Command::Function(value)
    }
}

impl From<Color> for Command {
    fn from(value: Color) -> Self {
        Command::Color(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_codes_match_remote() {
        let table: Vec<(u8, &str)> = Command::by_code()
            .map(|command| (command.code(), command.label()))
            .collect();

        assert_eq!(
            table,
            vec![
                (0x04, "Brightness-Down"),
                (0x05, "Brightness-Up"),
                (0x06, "Off"),
                (0x07, "On"),
                (0x08, "Green"),
                (0x09, "Red"),
                (0x0A, "Blue"),
                (0x0B, "White"),
                (0x0C, "Pea-Green"),
                (0x0D, "Orange"),
                (0x0E, "Dark-Orchid"),
                (0x0F, "Flash"),
                (0x10, "Cyan"),
                (0x11, "Dark-Yellow"),
                (0x12, "Magenta"),
                (0x13, "Fade"),
                (0x14, "Light-Blue"),
                (0x15, "Yellow"),
                (0x16, "Pink"),
                (0x17, "Strobe"),
                (0x18, "Sky-Blue"),
                (0x19, "Light-Yellow"),
                (0x1A, "Purple"),
                (0x1B, "Smooth"),
            ]
        );
    }

    #[test]
    fn codes_are_unique_across_categories() {
        let codes: HashSet<u8> = Command::by_code().map(Command::code).collect();
        let entries = Brightness::ALL.len() + Power::ALL.len() + Function::ALL.len() + Color::ALL.len();

        assert_eq!(codes.len(), entries);
        assert_eq!(entries, 24);
    }

    #[test]
    fn token_lookup_is_exact() {
        assert_eq!(Power::from_token("on"), Some(Power::On));
        assert_eq!(Power::from_token("ON"), None);
        assert_eq!(Power::from_token(" on"), None);
        assert_eq!(Color::from_token("pea-green"), Some(Color::PeaGreen));
        assert_eq!(Color::from_token("pea green"), None);
        assert_eq!(Function::from_token(""), None);
    }

    #[test]
    fn every_token_round_trips_through_its_code() {
        for command in Command::by_code() {
            let looked_up = match command.category() {
                Category::Brightness => Brightness::from_token(command.token()).map(Command::from),
                Category::Power => Power::from_token(command.token()).map(Command::from),
                Category::Function => Function::from_token(command.token()).map(Command::from),
                Category::Color => Color::from_token(command.token()).map(Command::from),
                Category::Raw => None,
            };

            assert_eq!(looked_up, Some(command));
        }
    }

    #[test]
    fn unknown_codes_have_no_command() {
        assert_eq!(Command::from_code(0x00), None);
        assert_eq!(Command::from_code(0x1C), None);
        assert_eq!(Command::from_code(0xFF), None);
    }

    #[test]
    fn category_from_path() {
        assert_eq!(Category::from_path("/color"), Some(Category::Color));
        assert_eq!(Category::from_path("/raw"), Some(Category::Raw));
        assert_eq!(Category::from_path("color"), None);
        assert_eq!(Category::from_path("/colors"), None);
    }
}
