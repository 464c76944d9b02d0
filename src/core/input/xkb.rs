//! Keymap engine.
//!
//! Wraps an xkbcommon keymap with two state trackers fed the same key
//! transitions. The *modified* tracker yields the symbol to insert as text;
//! the *unmodified* tracker keeps only the active layout group so shortcut
//! matching sees the physical key (Shift+1 is text "!" but shortcut "1").

use bitflags::bitflags;
use xkbcommon::xkb;

use crate::core::errors::ConfigError;
use crate::core::input::KeyState;
use crate::util::logging::KEYMAP;

/// Linux evdev codes are offset by 8 in XKB keycode space.
const EVDEV_OFFSET: u32 = 8;

/// An X keysym value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keysym(pub u32);

impl Keysym {
    pub const NO_SYMBOL: Keysym = Keysym(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Shift, Control, Alt, Meta, Super, Hyper, Caps/Shift lock and ISO level keys.
    pub fn is_modifier(&self) -> bool {
        matches!(self.0, 0xffe1..=0xffee | 0xfe01..=0xfe13)
    }
}

impl From<xkb::Keysym> for Keysym {
    fn from(sym: xkb::Keysym) -> Self {
        Keysym(sym.raw())
    }
}

bitflags! {
    /// Modifier bits used for shortcut matching.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierMask: u32 {
        const SHIFT     = 1 << 0;
        const CONTROL   = 1 << 1;
        const ALT       = 1 << 2;
        const SUPER     = 1 << 3;
        const CAPS_LOCK = 1 << 4;
        const NUM_LOCK  = 1 << 5;
    }
}

/// What to compile a keymap from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutDescriptor {
    /// Rules/model/layout/variant/options, resolved against the system XKB data
    Names {
        rules: String,
        model: String,
        layout: String,
        variant: String,
        options: Option<String>,
    },
    /// A complete keymap in XKB text format
    Text(String),
}

impl LayoutDescriptor {
    /// The built-in US keymap, usable without any system XKB data.
    pub fn minimal() -> Self {
        LayoutDescriptor::Text(MINIMAL_KEYMAP.to_string())
    }
}

/// Result of feeding one key transition through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTranslation {
    /// Symbol under the current modifiers, for text input
    pub keysym: Keysym,
    /// Symbol with modifiers stripped, for shortcut matching
    pub unmodified_keysym: Keysym,
    /// UTF-8 text produced by a key press (empty on release and for non-printables)
    pub text: String,
    /// Modifier mask after the transition
    pub modifiers: ModifierMask,
    /// Whether the transition changed the modifier mask
    pub modifiers_changed: bool,
}

/// Holds the compiled keymap and both state trackers.
pub struct KeymapEngine {
    context: xkb::Context,
    keymap: xkb::Keymap,
    modified: xkb::State,
    unmodified: xkb::State,
}

impl std::fmt::Debug for KeymapEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeymapEngine")
            .field("modifiers", &self.modifier_mask())
            .finish()
    }
}

impl KeymapEngine {
    /// Compile `descriptor`. Never falls back to another layout on failure.
    pub fn load_keymap(descriptor: &LayoutDescriptor) -> Result<Self, ConfigError> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = compile(&context, descriptor)?;
        let modified = xkb::State::new(&keymap);
        let unmodified = xkb::State::new(&keymap);

        tracing::info!(
            target: KEYMAP,
            "Keymap loaded ({} layouts, keycodes {}..={})",
            keymap.num_layouts(),
            keymap.min_keycode().raw(),
            keymap.max_keycode().raw()
        );

        Ok(Self {
            context,
            keymap,
            modified,
            unmodified,
        })
    }

    /// Replace the keymap at runtime. Both trackers restart from a clean
    /// state; on failure the current keymap stays in place.
    pub fn switch_layout(&mut self, descriptor: &LayoutDescriptor) -> Result<(), ConfigError> {
        let keymap = compile(&self.context, descriptor)?;
        self.modified = xkb::State::new(&keymap);
        self.unmodified = xkb::State::new(&keymap);
        self.keymap = keymap;
        tracing::info!(target: KEYMAP, "Keymap switched");
        Ok(())
    }

    /// Feed a raw evdev key transition into both trackers.
    ///
    /// A code outside the compiled range yields no symbol and leaves the
    /// modifier state untouched.
    pub fn update_state(&mut self, raw_key_code: u32, direction: KeyState) -> KeyTranslation {
        let before = self.modifier_mask();

        let Some(keycode) = self.keycode(raw_key_code) else {
            tracing::debug!(target: KEYMAP, "Key code {} outside keymap range", raw_key_code);
            return KeyTranslation {
                keysym: Keysym::NO_SYMBOL,
                unmodified_keysym: Keysym::NO_SYMBOL,
                text: String::new(),
                modifiers: before,
                modifiers_changed: false,
            };
        };

        let keysym = Keysym::from(self.modified.key_get_one_sym(keycode));
        let unmodified_keysym = Keysym::from(self.unmodified.key_get_one_sym(keycode));
        let text = match direction {
            KeyState::Pressed => self.modified.key_get_utf8(keycode),
            KeyState::Released => String::new(),
        };

        let xkb_direction = || match direction {
            KeyState::Pressed => xkb::KeyDirection::Down,
            KeyState::Released => xkb::KeyDirection::Up,
        };
        self.modified.update_key(keycode, xkb_direction());
        self.unmodified.update_key(keycode, xkb_direction());

        // Keep the group, drop every modifier.
        let layout = self.modified.serialize_layout(xkb::STATE_LAYOUT_EFFECTIVE);
        self.unmodified.update_mask(0, 0, 0, 0, 0, layout);

        let modifiers = self.modifier_mask();
        KeyTranslation {
            keysym,
            unmodified_keysym,
            text,
            modifiers,
            modifiers_changed: modifiers != before,
        }
    }

    /// Symbols a press of this key would produce now, without changing state.
    pub fn lookup(&self, raw_key_code: u32) -> KeyTranslation {
        let modifiers = self.modifier_mask();
        match self.keycode(raw_key_code) {
            Some(keycode) => KeyTranslation {
                keysym: Keysym::from(self.modified.key_get_one_sym(keycode)),
                unmodified_keysym: Keysym::from(self.unmodified.key_get_one_sym(keycode)),
                text: self.modified.key_get_utf8(keycode),
                modifiers,
                modifiers_changed: false,
            },
            None => KeyTranslation {
                keysym: Keysym::NO_SYMBOL,
                unmodified_keysym: Keysym::NO_SYMBOL,
                text: String::new(),
                modifiers,
                modifiers_changed: false,
            },
        }
    }

    /// Current modifiers, independent of any key event.
    pub fn modifier_mask(&self) -> ModifierMask {
        let held = xkb::STATE_MODS_DEPRESSED | xkb::STATE_MODS_LATCHED;
        let mut mask = ModifierMask::empty();
        mask.set(ModifierMask::SHIFT, self.is_active(xkb::MOD_NAME_SHIFT, held));
        mask.set(ModifierMask::CONTROL, self.is_active(xkb::MOD_NAME_CTRL, held));
        mask.set(ModifierMask::ALT, self.is_active(xkb::MOD_NAME_ALT, held));
        mask.set(ModifierMask::SUPER, self.is_active(xkb::MOD_NAME_LOGO, held));
        mask.set(
            ModifierMask::CAPS_LOCK,
            self.is_active(xkb::MOD_NAME_CAPS, xkb::STATE_MODS_EFFECTIVE),
        );
        mask.set(
            ModifierMask::NUM_LOCK,
            self.is_active(xkb::MOD_NAME_NUM, xkb::STATE_MODS_EFFECTIVE),
        );
        mask
    }

    /// Whether holding this key should auto-repeat.
    pub fn key_repeats(&self, raw_key_code: u32) -> bool {
        self.keycode(raw_key_code)
            .map(|kc| self.keymap.key_repeats(kc))
            .unwrap_or(false)
    }

    fn keycode(&self, raw_key_code: u32) -> Option<xkb::Keycode> {
        let code = raw_key_code.checked_add(EVDEV_OFFSET)?;
        let min = self.keymap.min_keycode().raw();
        let max = self.keymap.max_keycode().raw();
        (min..=max).contains(&code).then(|| xkb::Keycode::from(code))
    }

    fn is_active(&self, name: &str, component: xkb::StateComponent) -> bool {
        self.modified.mod_name_is_active(name, component)
    }
}

fn compile(context: &xkb::Context, descriptor: &LayoutDescriptor) -> Result<xkb::Keymap, ConfigError> {
    match descriptor {
        LayoutDescriptor::Names {
            rules,
            model,
            layout,
            variant,
            options,
        } => xkb::Keymap::new_from_names(
            context,
            rules,
            model,
            layout,
            variant,
            options.clone(),
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| {
            ConfigError::Keymap(format!(
                "rules={rules} model={model} layout={layout} variant={variant}"
            ))
        }),
        LayoutDescriptor::Text(text) => xkb::Keymap::new_from_string(
            context,
            text.clone(),
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| ConfigError::Keymap("keymap text failed to compile".to_string())),
    }
}

/// A self-contained US keymap covering the main block, arrows and lock keys.
pub const MINIMAL_KEYMAP: &str = concat!(
    "xkb_keymap {\n",
    "  xkb_keycodes \"wsd\" {\n",
    "    minimum = 8;\n",
    "    maximum = 255;\n",
    "    <ESC>  = 9;\n",
    "    <AE01> = 10;\n",
    "    <AE02> = 11;\n",
    "    <AE03> = 12;\n",
    "    <AE04> = 13;\n",
    "    <AE05> = 14;\n",
    "    <AE06> = 15;\n",
    "    <AE07> = 16;\n",
    "    <AE08> = 17;\n",
    "    <AE09> = 18;\n",
    "    <AE10> = 19;\n",
    "    <BKSP> = 22;\n",
    "    <TAB>  = 23;\n",
    "    <AD01> = 24;\n",
    "    <AD02> = 25;\n",
    "    <AD03> = 26;\n",
    "    <AD04> = 27;\n",
    "    <AD05> = 28;\n",
    "    <RTRN> = 36;\n",
    "    <LCTL> = 37;\n",
    "    <AC01> = 38;\n",
    "    <AC02> = 39;\n",
    "    <AC03> = 40;\n",
    "    <LFSH> = 50;\n",
    "    <AB01> = 52;\n",
    "    <AB02> = 53;\n",
    "    <AB03> = 54;\n",
    "    <AB04> = 55;\n",
    "    <RTSH> = 62;\n",
    "    <LALT> = 64;\n",
    "    <SPCE> = 65;\n",
    "    <CAPS> = 66;\n",
    "    <NMLK> = 77;\n",
    "    <RCTL> = 105;\n",
    "    <UP>   = 111;\n",
    "    <LEFT> = 113;\n",
    "    <RGHT> = 114;\n",
    "    <DOWN> = 116;\n",
    "    <LWIN> = 133;\n",
    "  };\n",
    "  xkb_types \"wsd\" {\n",
    "    type \"ONE_LEVEL\" {\n",
    "      modifiers = none;\n",
    "      map[none] = Level1;\n",
    "      level_name[Level1] = \"Any\";\n",
    "    };\n",
    "    type \"TWO_LEVEL\" {\n",
    "      modifiers = Shift;\n",
    "      map[Shift] = Level2;\n",
    "      level_name[Level1] = \"Base\";\n",
    "      level_name[Level2] = \"Shift\";\n",
    "    };\n",
    "    type \"ALPHABETIC\" {\n",
    "      modifiers = Shift+Lock;\n",
    "      map[Shift] = Level2;\n",
    "      map[Lock] = Level2;\n",
    "      level_name[Level1] = \"Base\";\n",
    "      level_name[Level2] = \"Caps\";\n",
    "    };\n",
    "  };\n",
    "  xkb_compatibility \"wsd\" {\n",
    "    interpret Caps_Lock+AnyOfOrNone(all) { action = LockMods(modifiers=Lock); };\n",
    "    interpret Num_Lock+AnyOfOrNone(all) { action = LockMods(modifiers=Mod2); };\n",
    "    interpret Any + AnyOf(all) { action = SetMods(modifiers=modMapMods,clearLocks); };\n",
    "  };\n",
    "  xkb_symbols \"wsd\" {\n",
    "    key <ESC>  { [ Escape ] };\n",
    "    key <AE01> { [ 1, exclam ] };\n",
    "    key <AE02> { [ 2, at ] };\n",
    "    key <AE03> { [ 3, numbersign ] };\n",
    "    key <AE04> { [ 4, dollar ] };\n",
    "    key <AE05> { [ 5, percent ] };\n",
    "    key <AE06> { [ 6, asciicircum ] };\n",
    "    key <AE07> { [ 7, ampersand ] };\n",
    "    key <AE08> { [ 8, asterisk ] };\n",
    "    key <AE09> { [ 9, parenleft ] };\n",
    "    key <AE10> { [ 0, parenright ] };\n",
    "    key <BKSP> { [ BackSpace ] };\n",
    "    key <TAB>  { [ Tab, ISO_Left_Tab ] };\n",
    "    key <AD01> { [ q, Q ] };\n",
    "    key <AD02> { [ w, W ] };\n",
    "    key <AD03> { [ e, E ] };\n",
    "    key <AD04> { [ r, R ] };\n",
    "    key <AD05> { [ t, T ] };\n",
    "    key <RTRN> { [ Return ] };\n",
    "    key <LCTL> { [ Control_L ] };\n",
    "    key <RCTL> { [ Control_R ] };\n",
    "    key <AC01> { [ a, A ] };\n",
    "    key <AC02> { [ s, S ] };\n",
    "    key <AC03> { [ d, D ] };\n",
    "    key <LFSH> { [ Shift_L ] };\n",
    "    key <RTSH> { [ Shift_R ] };\n",
    "    key <AB01> { [ z, Z ] };\n",
    "    key <AB02> { [ x, X ] };\n",
    "    key <AB03> { [ c, C ] };\n",
    "    key <AB04> { [ v, V ] };\n",
    "    key <LALT> { [ Alt_L, Meta_L ] };\n",
    "    key <SPCE> { [ space ] };\n",
    "    key <CAPS> { [ Caps_Lock ] };\n",
    "    key <NMLK> { [ Num_Lock ] };\n",
    "    key <UP>   { [ Up ] };\n",
    "    key <LEFT> { [ Left ] };\n",
    "    key <RGHT> { [ Right ] };\n",
    "    key <DOWN> { [ Down ] };\n",
    "    key <LWIN> { [ Super_L ] };\n",
    "    modifier_map Shift { <LFSH>, <RTSH> };\n",
    "    modifier_map Lock { <CAPS> };\n",
    "    modifier_map Control { <LCTL>, <RCTL> };\n",
    "    modifier_map Mod1 { <LALT> };\n",
    "    modifier_map Mod2 { <NMLK> };\n",
    "    modifier_map Mod4 { <LWIN> };\n",
    "  };\n",
    "};\n"
);

/// Evdev codes used by tests and the diagnostic tool.
pub mod keys {
    pub const KEY_ESC: u32 = 1;
    pub const KEY_1: u32 = 2;
    pub const KEY_2: u32 = 3;
    pub const KEY_Q: u32 = 16;
    pub const KEY_LEFTCTRL: u32 = 29;
    pub const KEY_A: u32 = 30;
    pub const KEY_S: u32 = 31;
    pub const KEY_LEFTSHIFT: u32 = 42;
    pub const KEY_Z: u32 = 44;
    pub const KEY_RIGHTSHIFT: u32 = 54;
    pub const KEY_LEFTALT: u32 = 56;
    pub const KEY_SPACE: u32 = 57;
    pub const KEY_CAPSLOCK: u32 = 58;
    pub const KEY_RIGHTCTRL: u32 = 97;
    pub const KEY_LEFTMETA: u32 = 125;
}
