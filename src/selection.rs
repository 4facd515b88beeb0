//! Label and category selector state.
//!
//! The GUI shows five label entries and three category entries. Each entry
//! is a typed record indexed by id, and renders read an immutable snapshot
//! ([`LabelSelection`] / [`CategorySelection`]) taken once per redraw.

use crate::config::{ColorScheme, LABEL_COUNT};
use crate::enums::Category;
use crate::events::{Control, ViewerEvents};
use crate::overlay::{LUT_SIZE, Rgb};

/// Set of selected label ids, iterated in ascending order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LabelSelection {
    ids: [bool; LUT_SIZE],
}

impl LabelSelection {
    /// Ids outside 1..=5 are ignored.
    pub fn from_ids(ids: impl IntoIterator<Item = u8>) -> Self {
        let mut selection = Self::default();
        for id in ids {
            if (1..LUT_SIZE).contains(&(id as usize)) {
                selection.ids[id as usize] = true;
            }
        }
        selection
    }

    pub fn contains(&self, id: u8) -> bool {
        self.ids.get(id as usize).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (1..LUT_SIZE as u8).filter(|&id| self.ids[id as usize])
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CategorySelection {
    checked: [bool; 3],
}

impl CategorySelection {
    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut selection = Self::default();
        for category in categories {
            selection.checked[category.index()] = true;
        }
        selection
    }

    pub fn contains(&self, category: Category) -> bool {
        self.checked[category.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(|&c| self.contains(c))
    }

    pub fn is_empty(&self) -> bool {
        !self.checked.iter().any(|&c| c)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectorEntry {
    pub enabled: bool,
    pub checked: bool,
    pub color: Rgb,
}

impl SelectorEntry {
    fn new(color: Rgb) -> Self {
        Self {
            enabled: false,
            checked: false,
            color,
        }
    }

    fn active(&self) -> bool {
        self.enabled && self.checked
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Selectors {
    labels: [SelectorEntry; LABEL_COUNT],
    categories: [SelectorEntry; 3],
}

impl Selectors {
    pub fn new(scheme: &ColorScheme) -> Self {
        Self {
            labels: scheme.mask.map(SelectorEntry::new),
            categories: Category::ALL.map(|c| SelectorEntry::new(scheme.category_color(c))),
        }
    }

    pub fn label(&self, id: u8) -> Option<&SelectorEntry> {
        (id as usize).checked_sub(1).and_then(|i| self.labels.get(i))
    }

    pub fn category(&self, category: Category) -> &SelectorEntry {
        &self.categories[category.index()]
    }

    pub fn set_label_checked(&mut self, id: u8, checked: bool) {
        if let Some(entry) = (id as usize)
            .checked_sub(1)
            .and_then(|i| self.labels.get_mut(i))
        {
            entry.checked = checked;
        }
    }

    pub fn set_category_checked(&mut self, category: Category, checked: bool) {
        self.categories[category.index()].checked = checked;
    }

    /// Enables label entries `1..=max_label` and the category entries when a
    /// prediction is loaded; everything else is disabled.
    pub fn sync(&mut self, max_label: u8, has_prediction: bool, events: &mut dyn ViewerEvents) {
        for (i, entry) in self.labels.iter_mut().enumerate() {
            let id = i as u8 + 1;
            entry.enabled = id <= max_label;
            events.on_control_enabled(Control::LabelSelector(id), entry.enabled);
        }
        for (entry, category) in self.categories.iter_mut().zip(Category::ALL) {
            entry.enabled = has_prediction;
            events.on_control_enabled(Control::CategorySelector(category), entry.enabled);
        }
    }

    /// Opacity controls are only useful while something they affect is
    /// selected.
    pub fn update_opacity_controls(&self, events: &mut dyn ViewerEvents) {
        events.on_control_enabled(Control::LabelOpacity, !self.label_snapshot().is_empty());
        events.on_control_enabled(
            Control::PredictionOpacity,
            !self.category_snapshot().is_empty(),
        );
    }

    pub fn label_snapshot(&self) -> LabelSelection {
        LabelSelection::from_ids(
            self.labels
                .iter()
                .enumerate()
                .filter(|(_, e)| e.active())
                .map(|(i, _)| i as u8 + 1),
        )
    }

    pub fn category_snapshot(&self) -> CategorySelection {
        CategorySelection::from_categories(
            Category::ALL
                .into_iter()
                .filter(|&c| self.categories[c.index()].active()),
        )
    }

    /// Applies a new color scheme without touching selection state.
    pub fn recolor(&mut self, scheme: &ColorScheme) {
        for (entry, color) in self.labels.iter_mut().zip(scheme.mask) {
            entry.color = color;
        }
        for (entry, category) in self.categories.iter_mut().zip(Category::ALL) {
            entry.color = scheme.category_color(category);
        }
    }
}
