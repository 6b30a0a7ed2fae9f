//! Page `<select>` controls for the user-selected options.
//!
//! Both controls are optional: a page may render neither, one, or both. Selecting a value
//! programmatically never fires a change event; only the host's user-input path does.

use crate::content::ContentKey;

/// DOM id of the culture selector.
pub const CULTURE_SELECT_ID: &str = "cultureSelectBox";

/// DOM id of the target-language selector.
pub const LANGUAGE_SELECT_ID: &str = "languageSelectBox";

/// The two user options round-tripped to the language server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    /// Culture (e.g. `en-US`).
    Culture,
    /// Target language for generated code (e.g. `Java`).
    Language,
}

impl OptionKind {
    /// Both kinds, in the order they are sent at session start.
    pub const ALL: [OptionKind; 2] = [OptionKind::Culture, OptionKind::Language];

    /// Key under which the option is stored in the content store.
    pub fn content_key(self) -> ContentKey {
        match self {
            OptionKind::Culture => ContentKey::Culture,
            OptionKind::Language => ContentKey::Language,
        }
    }

    /// DOM id of the matching control.
    pub fn control_id(self) -> &'static str {
        match self {
            OptionKind::Culture => CULTURE_SELECT_ID,
            OptionKind::Language => LANGUAGE_SELECT_ID,
        }
    }
}

/// A single `<option>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// Submitted value.
    pub value: String,
    /// Display label.
    pub label: String,
}

impl SelectOption {
    /// Create an option whose label equals its value.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
        }
    }

    /// Create an option with a distinct label.
    pub fn labeled(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// A `<select>` control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectControl {
    id: String,
    options: Vec<SelectOption>,
    selected: Option<usize>,
}

impl SelectControl {
    /// Create a control; the first option (if any) starts selected, like a browser would.
    pub fn new(id: impl Into<String>, options: Vec<SelectOption>) -> Self {
        let selected = if options.is_empty() { None } else { Some(0) };
        Self {
            id: id.into(),
            options,
            selected,
        }
    }

    /// DOM id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All options.
    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    /// Value of the selected option.
    pub fn selected_value(&self) -> Option<&str> {
        self.selected
            .and_then(|idx| self.options.get(idx))
            .map(|o| o.value.as_str())
    }

    /// Select the option with `value`.
    ///
    /// Returns `false` (leaving the selection unchanged) if no option has that value.
    pub fn select(&mut self, value: &str) -> bool {
        match self.options.iter().position(|o| o.value == value) {
            Some(idx) => {
                self.selected = Some(idx);
                true
            }
            None => false,
        }
    }
}

/// The optional page controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageControls {
    /// Culture selector (`cultureSelectBox`).
    pub culture: Option<SelectControl>,
    /// Target-language selector (`languageSelectBox`).
    pub language: Option<SelectControl>,
}

impl PageControls {
    /// A page without any controls.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build both controls from plain value lists. Empty lists leave the control absent.
    pub fn from_values<C, L>(cultures: C, languages: L) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        fn control<I>(id: &str, values: I) -> Option<SelectControl>
        where
            I: IntoIterator,
            I::Item: Into<String>,
        {
            let options: Vec<SelectOption> = values.into_iter().map(SelectOption::new).collect();
            (!options.is_empty()).then(|| SelectControl::new(id, options))
        }

        Self {
            culture: control(CULTURE_SELECT_ID, cultures),
            language: control(LANGUAGE_SELECT_ID, languages),
        }
    }

    /// The control for an option kind, if present.
    pub fn get(&self, kind: OptionKind) -> Option<&SelectControl> {
        match kind {
            OptionKind::Culture => self.culture.as_ref(),
            OptionKind::Language => self.language.as_ref(),
        }
    }

    /// Mutable control for an option kind, if present.
    pub fn get_mut(&mut self, kind: OptionKind) -> Option<&mut SelectControl> {
        match kind {
            OptionKind::Culture => self.culture.as_mut(),
            OptionKind::Language => self.language.as_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_only_accepts_known_values() {
        let mut control = SelectControl::new(
            CULTURE_SELECT_ID,
            vec![SelectOption::new("en-US"), SelectOption::labeled("de-DE", "Deutsch")],
        );
        assert_eq!(control.selected_value(), Some("en-US"));

        assert!(control.select("de-DE"));
        assert_eq!(control.selected_value(), Some("de-DE"));

        assert!(!control.select("xx-XX"));
        assert_eq!(control.selected_value(), Some("de-DE"));
    }

    #[test]
    fn test_from_values_skips_empty_lists() {
        let controls = PageControls::from_values(["en-US"], Vec::<String>::new());
        assert_eq!(controls.get(OptionKind::Culture).unwrap().id(), CULTURE_SELECT_ID);
        assert!(controls.get(OptionKind::Language).is_none());
    }

    #[test]
    fn test_option_kind_keys() {
        assert_eq!(OptionKind::Culture.content_key(), ContentKey::Culture);
        assert_eq!(OptionKind::Language.control_id(), LANGUAGE_SELECT_ID);
    }
}
