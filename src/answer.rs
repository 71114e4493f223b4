//! Retrieval-augmented answering.
//!
//! Embeds the caller's question, pulls the nearest documents under the
//! caller's access filter, attaches recent sales for any customer the
//! question mentions, and forwards the assembled context to the completion
//! provider. The provider's text comes back verbatim — no sources list, no
//! partial answers.

use tracing::debug;

use crate::completion::CompletionProvider;
use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{EngineError, Result};
use crate::matching::CustomerMatcher;
use crate::models::{AccessLevel, Document, Role, SaleWithProduct};
use crate::store::EntityStore;

const SYSTEM_PROMPT_HEADER: &str = "Eres un asistente experto en ventas y atención comercial. \
Usa SOLAMENTE la siguiente información de contexto para responder la pregunta del usuario. \
Si el usuario menciona un cliente con un nombre parecido pero no idéntico a uno del contexto, \
asume que se refiere a ese cliente. \
Si la respuesta no está en el contexto, responde \"No poseo información sobre eso\".";

/// Answer a question for a caller with the given role.
///
/// The access filter for [`Role::Customer`] is applied inside the store's
/// nearest-neighbor query, never by post-filtering retrieved rows, so
/// private content is not transmitted to non-privileged callers even
/// transiently. Provider failures surface as [`EngineError::Upstream`];
/// no partial answer is ever returned.
pub async fn ask(
    store: &dyn EntityStore,
    embedder: &dyn EmbeddingProvider,
    completer: &dyn CompletionProvider,
    matcher: &dyn CustomerMatcher,
    retrieval: &RetrievalConfig,
    question: &str,
    role: Role,
) -> Result<String> {
    let query_vector = embedder
        .generate(question)
        .await
        .map_err(|e| EngineError::Upstream(format!("embedding failed: {}", e)))?;
    if query_vector.is_empty() {
        return Err(EngineError::Upstream(
            "embedding provider returned an empty vector".to_string(),
        ));
    }

    let access_filter = match role {
        Role::Customer => Some(AccessLevel::Public),
        Role::Admin => None,
    };

    let documents = store
        .nearest_documents(&query_vector, retrieval.document_limit, access_filter)
        .await?;

    let known_names = store.distinct_customer_names().await?;
    let mentioned = matcher.matches(question, &known_names);

    let sales = if mentioned.is_empty() {
        Vec::new()
    } else {
        store
            .recent_sales_for_customers(&mentioned, retrieval.sales_limit)
            .await?
    };

    debug!(
        documents = documents.len(),
        customers = mentioned.len(),
        sales = sales.len(),
        "context assembled"
    );

    let context = build_context(&documents, &sales);
    let system_prompt = format!("{}\n\nContexto:\n{}", SYSTEM_PROMPT_HEADER, context);

    completer
        .complete(&system_prompt, question)
        .await
        .map_err(|e| EngineError::Upstream(format!("completion failed: {}", e)))
}

/// Assemble the prompt context: a products section, then a sales-history
/// section when any sales were retrieved.
fn build_context(documents: &[Document], sales: &[SaleWithProduct]) -> String {
    let mut context = String::from("Productos:\n");
    for doc in documents {
        context.push_str(&format!("- {}: {}\n", doc.name, doc.description));
    }

    if !sales.is_empty() {
        context.push_str("\nHistorial de ventas:\n");
        for item in sales {
            context.push_str(&format!(
                "- {} compró {}x {} por ${} el {}\n",
                item.sale.customer_name,
                item.sale.quantity,
                item.product_name,
                item.sale.price_total,
                item.sale.sale_date.format("%Y-%m-%d"),
            ));
        }
    }

    context
}
