use std::sync::Arc;

use super::types::{RagError, NO_RECORDS_SENTENCE};
use crate::db::Row;
use crate::llm::{GenerationBackend, ResilientInvoker};

/// Serializes rows to JSON and cuts the text to at most `budget` characters.
pub fn row_context(rows: &[Row], budget: usize) -> String {
    let json = serde_json::to_string(rows).unwrap_or_else(|_| "[]".to_string());
    match json.char_indices().nth(budget) {
        Some((byte_idx, _)) => json[..byte_idx].to_string(),
        None => json,
    }
}

fn answer_prompt(
    question: &str,
    rows: &[Row],
    columns: Option<&[String]>,
    row_limit: usize,
    budget: usize,
) -> String {
    let columns_line = columns
        .map(|c| format!("Contexto de colunas: {}\n", c.join(", ")))
        .unwrap_or_default();
    format!(
        "Você é um assistente que responde em português com texto bem escrito e claro.
Regra: devolva APENAS a resposta final ao usuário, como um parágrafo curto (2 a 5 frases).
NÃO mostre código, SQL, mensagens de erro ou explicações técnicas.
Use linguagem natural e explique o resultado de forma compreensível.
Se não houver dados suficientes, responda: \"{no_records}\".

Pergunta do usuário: {question}
{columns_line}Contexto (amostra de linhas, máx {row_limit}): {context}
",
        no_records = NO_RECORDS_SENTENCE,
        context = row_context(rows, budget),
    )
}

pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationBackend>,
    invoker: ResilientInvoker,
    row_limit: usize,
    context_char_budget: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        generator: Arc<dyn GenerationBackend>,
        invoker: ResilientInvoker,
        row_limit: usize,
        context_char_budget: usize,
    ) -> Self {
        Self {
            generator,
            invoker,
            row_limit,
            context_char_budget,
        }
    }

    /// Short natural-language answer from the question and sampled rows.
    ///
    /// `columns` are the retrieved descriptors in Retrieval mode.
    pub async fn synthesize(
        &self,
        question: &str,
        rows: &[Row],
        columns: Option<&[String]>,
    ) -> Result<String, RagError> {
        let prompt = answer_prompt(
            question,
            rows,
            columns,
            self.row_limit,
            self.context_char_budget,
        );
        let answer = self
            .invoker
            .invoke("generate answer", || self.generator.generate(&prompt))
            .await?;
        Ok(answer.trim().to_string())
    }
}
