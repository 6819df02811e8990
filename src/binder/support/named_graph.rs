// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Named entity graphs.

use crate::{
    error::Result,
    second_pass::NamedGraphSecondPass,
    source::{AnnotationTarget, ClassDetails, attrs::NamedEntityGraphAttr}
};

/// One pass per `named_entity_graph` on `class`.
///
/// Graphs without a name take the JPA entity name. Attribute nodes are
/// checked once every property of `entity` is bound.
///
/// # Errors
///
/// Undecodable payloads.
pub(crate) fn named_graph_passes(
    class: &ClassDetails,
    entity: &str,
    jpa_entity_name: &str
) -> Result<Vec<NamedGraphSecondPass>> {
    Ok(class
        .parse_repeated::<NamedEntityGraphAttr>("named_entity_graph")?
        .into_iter()
        .map(|graph| {
            let name = graph
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| jpa_entity_name.to_string());
            NamedGraphSecondPass::new(
                entity,
                name,
                graph.attribute_nodes.0,
                graph.include_all_attributes
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::source::SourceModel;

    #[test]
    fn unnamed_graph_takes_entity_name() {
        let sources = SourceModel::from_str(
            r#"
            #[entity]
            #[named_entity_graph(attribute_nodes("lines"))]
            #[named_entity_graph(name = "everything", include_all_attributes)]
            struct Order {
                #[id]
                id: i64
            }
            "#
        )
        .unwrap();
        let passes = named_graph_passes(sources.class("Order").unwrap(), "Order", "Purchase").unwrap();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].name(), "Purchase");
        assert_eq!(passes[1].name(), "everything");
    }
}
