//! Usage text served by the documentation routes.
//!
//! Content depends only on the command table, never on cached state, so
//! repeated calls return identical text.

use super::command_table::{Brightness, Category, Color, Command, CommandTable, Function, Power};
use std::fmt::Write;

const TITLE: &str = "IR Controlled LED Strip Web Service\n\n";

const SPECIAL_FUNCTIONS: &str = "\
Special functions behave differently when the command is sent while the \
strip is already in the selected mode:
  - Pressing flash once does the same as smooth
  - Pressing flash twice strobes between the color transitions of flash
  - Pressing strobe once strobes the currently displayed color
  - Pressing strobe twice smoothly changes the brightness of the static color
  - Pressing fade once fades between all colors
  - Pressing fade twice fades a single rgb channel, cycling through them
  - Pressing smooth once transitions between all colors abruptly
  - Pressing smooth twice flashes a single rgb channel, cycling through them
";

const BRIGHTNESS_TICKS: &str = "\
Brightness is adjusted in ticks. Moving from brightest to dimmest takes 9 ticks.
";

const FUNCTION_SPEED: &str = "\
While a special function runs, brightness adjustment changes its transition \
speed instead:
  - During flash increases/decreases transition speed (9 ticks)
  - During strobe increases/decreases transition speed (9 ticks)
  - During fade increases/decreases transition speed (9 ticks)
  - During smooth increases/decreases transition speed (9 ticks)
";

/// Description of all routes, served on `/` and `/routes`.
pub fn service_description() -> String {
    let mut text = String::from(TITLE);

    text.push_str("Routes:\n");
    text.push_str("\t- / (GET) Arguments: none\n");
    text.push_str("\t- /routes (GET) Arguments: none\n");
    text.push_str("\t- /cached-state (GET) Arguments: none\n");

    for category in Category::ALL {
        let value = match category {
            Category::Raw => "byte",
            _ => "string",
        };
        let _ = writeln!(
            text,
            "\t- /{category} (GET) Arguments: [documentation=<boolean>] or none, \
             (POST) Arguments: [{category}=<{value}>]"
        );
    }

    text
}

/// Usage text for one category.
pub fn usage(category: Category) -> String {
    match category {
        Category::Raw => raw_usage(),
        Category::Brightness => brightness_usage(),
        Category::Power => power_usage(),
        Category::Function => function_usage(),
        Category::Color => color_usage(),
    }
}

fn raw_usage() -> String {
    let mut text = String::from(TITLE);

    text.push_str(
        "Raw command expects a POST request with a single argument named raw. \
         Its value is a byte code (decimal, 0 to 255) from the table below.\n\n",
    );
    text.push_str("Codes:\n");
    for command in Command::by_code() {
        let _ = writeln!(text, "    0x{:02X} {}", command.code(), command.label());
    }
    text.push('\n');
    text.push_str(SPECIAL_FUNCTIONS);
    text.push('\n');
    text.push_str(BRIGHTNESS_TICKS);
    text.push('\n');
    text.push_str(FUNCTION_SPEED);

    text
}

fn brightness_usage() -> String {
    let mut text = enumeration_header::<Brightness>();

    text.push_str(&behavior_table(&[
        (Brightness::Up, "Shifts LED brightness up a step"),
        (Brightness::Down, "Shifts LED brightness down a step"),
    ]));
    text.push('\n');
    text.push_str(BRIGHTNESS_TICKS);
    text.push('\n');
    text.push_str(FUNCTION_SPEED);

    text
}

fn power_usage() -> String {
    let mut text = enumeration_header::<Power>();

    text.push_str(&behavior_table(&[
        (Power::On, "Commands LED controller to ON state"),
        (Power::Off, "Commands LED controller to OFF state"),
    ]));

    text
}

fn function_usage() -> String {
    let mut text = enumeration_header::<Function>();

    text.push_str(&behavior_table(&[
        (Function::Flash, "Flash a subset of preselected colors (note)"),
        (Function::Strobe, "Strobe last static color selected (note)"),
        (Function::Fade, "Fade last static color selected (note)"),
        (Function::Smooth, "Smooth last static color selected (note)"),
    ]));
    text.push('\n');
    text.push_str(SPECIAL_FUNCTIONS);
    text.push('\n');
    text.push_str(FUNCTION_SPEED);

    text
}

fn color_usage() -> String {
    let mut text = enumeration_header::<Color>();

    for color in Color::ALL {
        let _ = writeln!(text, "   - {color}");
    }

    text
}

fn enumeration_header<T: CommandTable>() -> String {
    let category = T::CATEGORY.name();
    let mut capitalized = category.to_string();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    format!(
        "{TITLE}{capitalized} command expects a POST request with a single argument named \
         {category}. Its value is one of the strings below.\n\n"
    )
}

fn behavior_table<T: CommandTable>(rows: &[(T, &str)]) -> String {
    let token_width = rows
        .iter()
        .map(|(entry, _)| entry.token().len())
        .max()
        .unwrap_or(0)
        .max("String".len());

    let mut text = format!("   {:<token_width$} | Behavior\n", "String");
    let _ = writeln!(text, "   {}-|-{}", "-".repeat(token_width), "-".repeat(40));
    for (entry, behavior) in rows {
        let _ = writeln!(text, "   {:<token_width$} | {behavior}", entry.token());
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_usage_lists_every_code() {
        let text = usage(Category::Raw);

        assert!(text.contains("    0x04 Brightness-Down\n"));
        assert!(text.contains("    0x0C Pea-Green\n"));
        assert!(text.contains("    0x1B Smooth\n"));
        assert_eq!(text.matches("    0x").count(), 24);
        assert!(text.contains("9 ticks"));
        assert!(text.contains("Pressing strobe twice"));
    }

    #[test]
    fn raw_usage_reproduces_the_remote_code_table() {
        let text = usage(Category::Raw);
        let table: Vec<_> = text
            .lines()
            .filter_map(|line| line.strip_prefix("    0x"))
            .map(|entry| format!("0x{entry}"))
            .collect();

        assert_eq!(
            table.join(", "),
            "0x04 Brightness-Down, 0x05 Brightness-Up, 0x06 Off, 0x07 On, 0x08 Green, \
             0x09 Red, 0x0A Blue, 0x0B White, 0x0C Pea-Green, 0x0D Orange, 0x0E Dark-Orchid, \
             0x0F Flash, 0x10 Cyan, 0x11 Dark-Yellow, 0x12 Magenta, 0x13 Fade, \
             0x14 Light-Blue, 0x15 Yellow, 0x16 Pink, 0x17 Strobe, 0x18 Sky-Blue, \
             0x19 Light-Yellow, 0x1A Purple, 0x1B Smooth"
        );
    }

    #[test]
    fn function_and_brightness_usage_explain_special_behavior() {
        let function = usage(Category::Function);
        let brightness = usage(Category::Brightness);

        assert!(function.contains("Pressing fade twice"));
        assert!(function.contains("transition speed"));
        assert!(brightness.contains("brightest to dimmest takes 9 ticks"));
        assert!(brightness.contains("up     | Shifts LED brightness up a step"));
    }

    #[test]
    fn color_usage_lists_colors_in_order() {
        let text = usage(Category::Color);
        let white = text.find("- white").unwrap();
        let pink = text.find("- pink").unwrap();

        assert!(white < pink);
        assert_eq!(text.matches("   - ").count(), 16);
        assert!(text.starts_with("IR Controlled LED Strip Web Service\n\nColor command"));
    }

    #[test]
    fn usage_is_stable() {
        for category in Category::ALL {
            assert_eq!(usage(category), usage(category));
            assert!(usage(category).contains(category.name()));
        }
    }

    #[test]
    fn service_description_lists_routes() {
        let text = service_description();

        assert!(text.contains("/cached-state (GET)"));
        assert!(text.contains("/raw (GET) Arguments: [documentation=<boolean>] or none, (POST) Arguments: [raw=<byte>]"));
        assert!(text.contains("(POST) Arguments: [color=<string>]"));
    }
}
