//! Term filtering policy: which proposed glossary entries are worth keeping

use std::collections::HashSet;

use super::GlossaryEntry;

/// Generic fantasy-novel vocabulary that never belongs in the glossary.
/// Terms here are matched case-insensitively against the bare term.
const DENYLIST: &[&str] = &[
    // Generic titles and roles
    "magic", "sword", "guild", "king", "queen", "lord", "lady", "master", "knight",
    "warrior", "mage", "priest", "merchant", "guard", "soldier", "captain", "general",
    "princess", "prince", "duke", "count", "baron", "noble", "servant", "butler",
    "maid", "blacksmith", "farmer", "hunter", "adventurer", "hero", "villain",
    "enemy", "ally", "friend", "student", "teacher",
    // Common locations
    "inn", "tavern", "shop", "market", "street", "road", "forest", "mountain",
    "river", "lake", "sea", "village", "town", "city", "kingdom", "empire",
    "castle", "palace", "tower", "gate", "church", "temple", "shrine", "school",
    "academy", "library", "prison", "house", "home", "bridge", "plaza", "garden",
    // Common items
    "weapon", "armor", "shield", "bow", "arrow", "spear", "axe", "dagger", "staff",
    "potion", "scroll", "book", "letter", "map", "key", "coin", "gold", "silver",
    "iron", "steel", "food", "water", "wine", "bread",
    // Creatures and beings
    "monster", "demon", "devil", "angel", "god", "goddess", "spirit", "ghost",
    "soul", "dragon", "wolf", "bear", "horse", "beast", "creature",
    "orc", "elf", "dwarf", "human",
    // Elements and magic terms
    "fire", "earth", "air", "wind", "ice", "lightning", "light", "dark", "flame",
    "power", "strength", "skill", "ability", "technique", "spell", "curse",
    "blessing", "ritual",
];

/// Phrases in a description that mark an entry as generic or one-off.
const GENERIC_INDICATORS: &[&str] = &[
    "a type of",
    "a kind of",
    "general term",
    "common",
    "ordinary",
    "generic",
    "minor character",
    "side character",
    "background",
    "mentioned briefly",
    "appears once",
];

/// Pluggable keep/drop policy for glossary entries. The default instance
/// carries the static denylist; tests can build an empty one.
pub struct TermFilter {
    denylist: HashSet<&'static str>,
}

impl Default for TermFilter {
    fn default() -> Self {
        Self {
            denylist: DENYLIST.iter().copied().collect(),
        }
    }
}

impl TermFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self {
            denylist: HashSet::new(),
        }
    }

    fn is_generic_term(&self, term: &str) -> bool {
        self.denylist.contains(term.trim().to_lowercase().as_str())
    }

    fn is_generic_description(&self, description: &str) -> bool {
        let description = description.to_lowercase();
        GENERIC_INDICATORS
            .iter()
            .any(|indicator| description.contains(indicator))
    }

    /// An entry with an original-script form is always kept; those are the
    /// terms a translator actually needs pinned down. Everything else is
    /// dropped when the term is denylisted or the description reads generic.
    pub fn should_drop(&self, entry: &GlossaryEntry) -> bool {
        if entry.original_form.is_some() {
            return false;
        }
        self.is_generic_term(&entry.term) || self.is_generic_description(&entry.description)
    }

    /// Why an entry would be dropped, for reporting in `glossary clean`.
    pub fn drop_reason(&self, entry: &GlossaryEntry) -> Option<&'static str> {
        if entry.original_form.is_some() {
            return None;
        }
        if self.is_generic_term(&entry.term) {
            Some("common term")
        } else if self.is_generic_description(&entry.description) {
            Some("generic description")
        } else {
            None
        }
    }
}
