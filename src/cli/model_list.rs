//! Model listing functionality

use crate::core::providers::ProviderRegistry;

pub fn list_models(registry: &ProviderRegistry, selected: &str) {
    println!("🤖 Available Models");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    print!("{}", render_model_groups(registry, selected));
}

fn render_model_groups(registry: &ProviderRegistry, selected: &str) -> String {
    let mut out = String::new();
    for (provider, models) in registry.model_groups() {
        out.push('\n');
        out.push_str(provider);
        out.push('\n');
        for model in models {
            let marker = if *model == selected { "*" } else { " " };
            out.push_str(&format!("  {marker} {model}\n"));
        }
    }

    let listed = registry
        .model_groups()
        .iter()
        .any(|(_, models)| models.contains(&selected));
    if !listed {
        out.push_str(&format!("\nSelected: {selected}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_selected_model() {
        let rendered = render_model_groups(&ProviderRegistry::default(), "claude-2");
        assert!(rendered.contains("Anthropic\n  * claude-2\n    claude-3-5-sonnet-latest\n"));
        assert!(rendered.contains("    gpt-4o\n"));
        assert!(!rendered.contains("Selected:"));
    }

    #[test]
    fn unlisted_selection_is_shown_separately() {
        let rendered = render_model_groups(&ProviderRegistry::default(), "gpt-4o-mini");
        assert!(!rendered.contains('*'));
        assert!(rendered.ends_with("\nSelected: gpt-4o-mini\n"));
    }
}
