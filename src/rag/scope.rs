//! Keyword gate that keeps clearly off-topic questions away from the models.
//!
//! Best-effort pre-filter, not a security boundary.

/// Entity and attribute terms of the accounts dataset, with plural and
/// accented variants.
const DOMAIN_VOCABULARY: &[&str] = &[
    "pessoa",
    "pessoas",
    "fornecedor",
    "fornecedores",
    "cliente",
    "clientes",
    "faturado",
    "faturados",
    "classificacao",
    "classificação",
    "classificacoes",
    "classificações",
    "despesa",
    "despesas",
    "receita",
    "receitas",
    "movimento",
    "movimentos",
    "conta",
    "contas",
    "parcela",
    "parcelas",
    "nota",
    "valor",
    "saldo",
    "status",
];

#[derive(Debug, Clone)]
pub struct DomainScopeGate {
    vocabulary: Vec<String>,
}

impl DomainScopeGate {
    pub fn new(extra_terms: &[String]) -> Self {
        let mut vocabulary: Vec<String> = DOMAIN_VOCABULARY.iter().map(|t| t.to_string()).collect();
        vocabulary.extend(
            extra_terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty()),
        );
        Self { vocabulary }
    }

    /// Case-insensitive containment of any vocabulary term.
    pub fn is_in_scope(&self, question: &str) -> bool {
        let lowered = question.to_lowercase();
        self.vocabulary.iter().any(|term| lowered.contains(term.as_str()))
    }
}

impl Default for DomainScopeGate {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_domain_questions_in_any_case() {
        let gate = DomainScopeGate::default();
        assert!(gate.is_in_scope("Quantos fornecedores estão cadastrados?"));
        assert!(gate.is_in_scope("QUAL O SALDO DAS PARCELAS EM ABERTO?"));
        assert!(gate.is_in_scope("Liste as Classificações de despesa"));
    }

    #[test]
    fn rejects_off_topic_questions() {
        let gate = DomainScopeGate::default();
        assert!(!gate.is_in_scope("Qual a capital da França?"));
        assert!(!gate.is_in_scope("Escreva um poema sobre o mar"));
        assert!(!gate.is_in_scope(""));
    }

    #[test]
    fn substring_containment_matches_inside_words() {
        let gate = DomainScopeGate::default();
        // "contas" contains "conta"; "anotação" contains "nota"
        assert!(gate.is_in_scope("minhas contas"));
        assert!(gate.is_in_scope("uma anotação"));
    }

    #[test]
    fn extra_terms_extend_the_vocabulary() {
        let gate = DomainScopeGate::new(&["  Boleto ".to_string(), "   ".to_string()]);
        assert!(gate.is_in_scope("quantos boletos vencem hoje?"));
        assert!(!gate.is_in_scope("como está o tempo?"));
    }
}
