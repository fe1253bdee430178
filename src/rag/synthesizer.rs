//! NL→SQL prompt construction and output sanitization.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use super::types::{RagError, MODEL_REFUSAL_SENTENCE};
use crate::llm::{GenerationBackend, ResilientInvoker};

static FENCE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn fence_pattern() -> &'static Regex {
    FENCE_PATTERN.get_or_init(|| Regex::new(r"(?i)```(sql)?").expect("valid regex"))
}

/// Marker phrase of the refusal sentence.
const REFUSAL_MARKER: &str = "fora do escopo";

/// Sanitized model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlCandidate {
    /// Text to hand to the guard. May still be unparseable.
    Statement(String),
    /// The model declined the question.
    Refusal,
}

/// Strips code fences, surrounding whitespace and trailing semicolons.
///
/// Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.to_string();
    // removing one fence can splice the remains of another together
    while fence_pattern().is_match(&text) {
        text = fence_pattern().replace_all(&text, "").into_owned();
    }
    text.trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

/// Case-insensitive substring check for the refusal marker.
///
/// A paraphrased refusal is not detected and will reach the database as SQL.
pub fn is_refusal(text: &str) -> bool {
    text.to_lowercase().contains(REFUSAL_MARKER)
}

pub fn classify(raw: &str) -> SqlCandidate {
    let text = sanitize(raw);
    if is_refusal(&text) {
        SqlCandidate::Refusal
    } else {
        SqlCandidate::Statement(text)
    }
}

fn direct_prompt(question: &str, schema_text: &str) -> String {
    format!(
        "Gere um SELECT SQL para Postgres que responda à pergunta do usuário.
Restrições:
- NÃO faça INSERT/UPDATE/DELETE/CREATE/DROP; apenas SELECT.
- Use somente tabelas e colunas existentes no schema abaixo.
- Prefira retornos agregados quando a pergunta pedir quantidades (por ex., count(*)).
- Responda apenas perguntas sobre este domínio. Se a pergunta estiver fora do escopo do schema, responda exatamente: \"{refusal}\" e não gere SQL.
Retorne apenas o SQL puro, sem explicações.

Schema:
{schema_text}

Pergunta: {question}
",
        refusal = MODEL_REFUSAL_SENTENCE,
    )
}

fn retrieval_prompt(question: &str, schema_text: &str, context: &[String]) -> String {
    format!(
        "Gere um SELECT SQL para Postgres que responda à pergunta do usuário.
Use APENAS as colunas fornecidas no contexto e no schema.
Restrições:
- SOMENTE SELECT (sem INSERT/UPDATE/DELETE/CREATE/DROP).
- Se a pergunta estiver fora do escopo, responda exatamente: \"{refusal}\" e não gere SQL.
- Prefira retornos agregados quando a pergunta pedir quantidades (por ex., count(*)).
- Utilize EXATAMENTE os nomes de tabelas e colunas do schema. Não invente nomes.
- Exemplos:
  - \"Quantos fornecedores estão cadastrados?\" -> SELECT count(*) AS total FROM Pessoas WHERE tipo = 'FORNECEDOR'
  - \"Liste as classificações de despesa ativas.\" -> SELECT descricao FROM Classificacao WHERE tipo = 'DESPESA' AND status = 'ATIVO'
  - \"Qual o total de parcelas em aberto?\" -> SELECT sum(valorparcela) AS total FROM ParcelasContas WHERE statusparcela = 'ABERTA'
Retorne apenas o SQL puro, sem explicações.

Pergunta: {question}
Contexto:
{context}

Schema:
{schema_text}
",
        refusal = MODEL_REFUSAL_SENTENCE,
        context = context.join("\n"),
    )
}

pub struct SqlSynthesizer {
    generator: Arc<dyn GenerationBackend>,
    invoker: ResilientInvoker,
}

impl SqlSynthesizer {
    pub fn new(generator: Arc<dyn GenerationBackend>, invoker: ResilientInvoker) -> Self {
        Self { generator, invoker }
    }

    /// Asks the model for one read-only statement.
    ///
    /// `context` holds retrieved column descriptors; `None` builds the
    /// schema-only prompt.
    pub async fn synthesize(
        &self,
        question: &str,
        schema_text: &str,
        context: Option<&[String]>,
    ) -> Result<SqlCandidate, RagError> {
        let prompt = match context {
            Some(context) => retrieval_prompt(question, schema_text, context),
            None => direct_prompt(question, schema_text),
        };

        let raw = self
            .invoker
            .invoke("generate sql", || self.generator.generate(&prompt))
            .await?;

        let candidate = classify(&raw);
        tracing::debug!("SQL candidate: {:?}", candidate);
        Ok(candidate)
    }
}
