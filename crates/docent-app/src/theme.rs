//! Terminal rendering of themes: colour palettes and banners.

use colored::{Color, ColoredString, Colorize};

use docent_core::Theme;

/// Colours used for each kind of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub banner: Color,
    pub user: Color,
    pub assistant: Color,
    pub system: Color,
    pub accent: Color,
}

pub fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Cyberpunk => Palette {
            banner: Color::BrightMagenta,
            user: Color::BrightGreen,
            assistant: Color::BrightCyan,
            system: Color::BrightBlack,
            accent: Color::BrightYellow,
        },
        Theme::Ocean => Palette {
            banner: Color::Blue,
            user: Color::BrightWhite,
            assistant: Color::BrightBlue,
            system: Color::Cyan,
            accent: Color::BrightCyan,
        },
        Theme::Forest => Palette {
            banner: Color::Green,
            user: Color::BrightYellow,
            assistant: Color::BrightGreen,
            system: Color::Yellow,
            accent: Color::TrueColor { r: 139, g: 90, b: 43 },
        },
        Theme::Sunset => Palette {
            banner: Color::Red,
            user: Color::BrightWhite,
            assistant: Color::TrueColor { r: 255, g: 165, b: 0 },
            system: Color::Magenta,
            accent: Color::BrightRed,
        },
    }
}

pub fn banner(theme: Theme) -> &'static str {
    match theme {
        Theme::Cyberpunk => concat!(
            "╔══════════════════════════════════════╗\n",
            "║  ▓▓ D O C E N T ▓▓   // neon archive  ║\n",
            "╚══════════════════════════════════════╝",
        ),
        Theme::Ocean => concat!(
            " ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~\n",
            "   ≈≈  D O C E N T  ≈≈   deep search   \n",
            " ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~",
        ),
        Theme::Forest => concat!(
            "   /\\      /\\      /\\      /\\      /\\\n",
            "  /  \\  D O C E N T  the quiet stacks\n",
            " /____\\    ||      ||      ||      ||",
        ),
        Theme::Sunset => concat!(
            "            .  *  .  \\ | /  .  *  .\n",
            "  D O C E N T   ---  ( ☀ )  ---  golden hour\n",
            "            ~~~~~~~~~~~~~~~~~~~~~~~~~",
        ),
    }
}

/// The banner painted in the theme's banner colour.
pub fn painted_banner(theme: Theme) -> ColoredString {
    banner(theme).color(palette(theme).banner).bold()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_theme_has_banner_and_palette() {
        for theme in Theme::ALL {
            assert!(banner(theme).contains("D O C E N T"));
            let p = palette(theme);
            assert_ne!(p.user, p.assistant);
        }
    }

    #[test]
    fn test_palettes_differ() {
        assert_ne!(palette(Theme::Cyberpunk), palette(Theme::Ocean));
        assert_ne!(palette(Theme::Forest), palette(Theme::Sunset));
    }
}
