//! Prompt composition.
//!
//! Both functions are pure: the same inputs always produce the same text.

use crate::image::PersonGeneration;

/// Appends style, variation and strict-count clauses to `base`.
///
/// Styles and variations are applied in order, one clause each. The
/// count clause only appears when more than one image is requested, so
/// `augment(p, &[], &[], 1) == p`.
pub fn augment<S, V>(base: &str, styles: &[S], variations: &[V], count: u32) -> String
where
    S: AsRef<str>,
    V: AsRef<str>,
{
    let mut prompt = base.to_string();

    for style in styles {
        prompt.push_str(", in the style of ");
        prompt.push_str(style.as_ref());
    }
    for variation in variations {
        prompt.push_str(", variation: ");
        prompt.push_str(variation.as_ref());
    }

    // Image models tend to return "a few" images unless told an exact number.
    if count > 1 {
        prompt.push_str(&format!(
            ". Generate exactly {count} distinct images, each as a separate image."
        ));
    }

    prompt
}

/// Appends negative-prompt and person guidance to an already augmented prompt.
pub fn apply_guidance(
    prompt: &str,
    negative_prompt: Option<&str>,
    person_generation: PersonGeneration,
) -> String {
    let mut out = prompt.to_string();

    if let Some(negative) = negative_prompt.map(str::trim).filter(|n| !n.is_empty()) {
        out.push_str(&format!(" \n(Exclude: {negative})"));
    }

    match person_generation {
        PersonGeneration::AllowAll => {}
        PersonGeneration::AllowAdult => {
            out.push_str(" \n(If people are included, they must be adults.)")
        }
        PersonGeneration::DontAllow => out.push_str(" \n(Do not include people in this image.)"),
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn test_single_image_without_clauses_is_unchanged() {
        assert_eq!(augment("A red cube", NONE, NONE, 1), "A red cube");
    }

    #[test]
    fn test_is_deterministic() {
        let a = augment("A robot", &["Cyberpunk", "Neon"], &["Rainy"], 3);
        let b = augment("A robot", &["Cyberpunk", "Neon"], &["Rainy"], 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_clause_per_style_and_variation_in_order() {
        let prompt = augment("A city street", &["Cyberpunk", "Neon"], &["Rainy", "Dusk"], 1);
        assert_eq!(
            prompt,
            "A city street, in the style of Cyberpunk, in the style of Neon, \
             variation: Rainy, variation: Dusk"
        );
    }

    #[test]
    fn test_duplicate_styles_are_kept() {
        let prompt = augment("A cat", &["Ink", "Ink"], NONE, 1);
        assert_eq!(prompt.matches("in the style of Ink").count(), 2);
    }

    #[test]
    fn test_strict_count_clause() {
        let prompt = augment("A robot", NONE, NONE, 4);
        assert!(prompt.starts_with("A robot. "));
        assert!(prompt.contains("Generate exactly 4 distinct images"));
        assert!(!augment("A robot", NONE, NONE, 1).contains("exactly"));
    }

    #[test]
    fn test_guidance_negative_prompt() {
        let out = apply_guidance("A beach", Some("people, boats"), PersonGeneration::AllowAll);
        assert_eq!(out, "A beach \n(Exclude: people, boats)");
    }

    #[test]
    fn test_guidance_blank_negative_prompt_is_ignored() {
        let out = apply_guidance("A beach", Some("  "), PersonGeneration::AllowAll);
        assert_eq!(out, "A beach");
    }

    #[test]
    fn test_guidance_person_generation() {
        let out = apply_guidance("A street", None, PersonGeneration::DontAllow);
        assert!(out.ends_with("(Do not include people in this image.)"));
        let out = apply_guidance("A street", None, PersonGeneration::AllowAdult);
        assert!(out.ends_with("(If people are included, they must be adults.)"));
    }
}
