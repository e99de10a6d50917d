//! Trait derivation from free-text personality descriptions.
//!
//! Traits are persistent [0,1] dimensions parsed once at agent creation.
//! A built-in keyword lexicon covers the traits the engine itself reads
//! (introversion, ambition, curiosity, romantic); world definitions can
//! declare more traits with their own keyword lists, which merge over
//! the built-ins.

use std::collections::BTreeMap;

use hamlet_types::worlddef::TraitDef;

/// Value a trait starts from before keyword evidence.
const BASELINE: f64 = 0.5;

/// How much one keyword hit moves a trait.
const KEYWORD_STEP: f64 = 0.2;

/// Built-in lexicon entry: trait id, raising keywords, lowering keywords.
struct LexiconEntry {
    id: &'static str,
    raises: &'static [&'static str],
    lowers: &'static [&'static str],
}

/// The built-in trait lexicon.
///
/// Raising keywords push the trait toward 1, lowering keywords toward 0,
/// one step per hit.
const LEXICON: &[LexiconEntry] = &[
    LexiconEntry {
        id: "introversion",
        raises: &["quiet", "shy", "reserved", "solitary", "introvert", "withdrawn"],
        lowers: &["outgoing", "gregarious", "chatty", "sociable", "extrovert", "friendly"],
    },
    LexiconEntry {
        id: "ambition",
        raises: &["ambitious", "driven", "determined", "striving", "power", "leader"],
        lowers: &["content", "humble", "modest", "easygoing", "laid-back"],
    },
    LexiconEntry {
        id: "curiosity",
        raises: &["curious", "inquisitive", "scholar", "inventive", "explorer", "wonder"],
        lowers: &["incurious", "traditional", "set in her ways", "set in his ways"],
    },
    LexiconEntry {
        id: "romantic",
        raises: &["romantic", "passionate", "affectionate", "flirtatious", "warm-hearted"],
        lowers: &["aloof", "cold", "detached", "stoic"],
    },
    LexiconEntry {
        id: "kindness",
        raises: &["kind", "gentle", "caring", "generous", "compassionate"],
        lowers: &["cruel", "harsh", "selfish", "spiteful", "mean"],
    },
    LexiconEntry {
        id: "bravery",
        raises: &["brave", "bold", "fearless", "daring", "courageous"],
        lowers: &["timid", "cautious", "anxious", "fearful", "nervous"],
    },
];

/// Derive an agent's traits from a free-text personality description.
///
/// The built-in lexicon is evaluated first; any [`TraitDef`]s from the
/// world definition are merged over it, their keywords raising the trait
/// from its declared default. Every value is clamped into [0,1].
pub fn derive_traits(description: &str, extra: &[TraitDef]) -> BTreeMap<String, f64> {
    let lowered = description.to_lowercase();
    let mut traits = BTreeMap::new();

    for entry in LEXICON {
        let mut value = BASELINE;
        for keyword in entry.raises {
            if lowered.contains(keyword) {
                value += KEYWORD_STEP;
            }
        }
        for keyword in entry.lowers {
            if lowered.contains(keyword) {
                value -= KEYWORD_STEP;
            }
        }
        traits.insert(entry.id.to_owned(), value.clamp(0.0, 1.0));
    }

    for def in extra {
        let mut value = def.default;
        for keyword in &def.keywords {
            if lowered.contains(&keyword.to_lowercase()) {
                value += KEYWORD_STEP;
            }
        }
        traits.insert(def.id.clone(), value.clamp(0.0, 1.0));
    }

    traits
}
