use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
	Eq,
	Ne,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTerm {
	pub field: String,
	pub op: FilterOp,
	pub value: serde_json::Value,
}
impl FilterTerm {
	pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		Self { field: field.into(), op: FilterOp::Eq, value: value.into() }
	}

	pub fn ne(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		Self { field: field.into(), op: FilterOp::Ne, value: value.into() }
	}
}

/// Conjunction of equality and inequality terms. Empty means "all documents,
/// bounded by the caller's limit".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
	pub terms: Vec<FilterTerm>,
}
impl Predicate {
	pub fn new(terms: Vec<FilterTerm>) -> Self {
		Self { terms }
	}

	pub fn is_empty(&self) -> bool {
		self.terms.is_empty()
	}

	pub fn len(&self) -> usize {
		self.terms.len()
	}

	/// Fields referenced by any term, deduplicated, insertion order kept.
	pub fn fields(&self) -> Vec<&str> {
		let mut fields: Vec<&str> = Vec::new();

		for term in &self.terms {
			if !fields.contains(&term.field.as_str()) {
				fields.push(&term.field);
			}
		}

		fields
	}

	/// True when `fields` satisfies every term. Equality terms on the same
	/// field form an implicit OR (any one of the values matches); inequality
	/// terms are all required.
	pub fn matches(&self, fields: &serde_json::Value) -> bool {
		let mut eq_fields: Vec<&str> = Vec::new();

		for term in &self.terms {
			if term.op == FilterOp::Eq && !eq_fields.contains(&term.field.as_str()) {
				eq_fields.push(&term.field);
			}
		}

		for field in eq_fields {
			let matched = self.terms.iter().any(|term| {
				term.op == FilterOp::Eq
					&& term.field == field && fields.get(field) == Some(&term.value)
			});

			if !matched {
				return false;
			}
		}

		self.terms
			.iter()
			.filter(|term| term.op == FilterOp::Ne)
			.all(|term| fields.get(&term.field) != Some(&term.value))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_field_equalities_form_an_or() {
		let predicate = Predicate::new(vec![
			FilterTerm::eq("contractor_party", "acme"),
			FilterTerm::eq("contractor_party", "globex"),
		]);

		assert!(predicate.matches(&serde_json::json!({ "contractor_party": "acme" })));
		assert!(predicate.matches(&serde_json::json!({ "contractor_party": "globex" })));
		assert!(!predicate.matches(&serde_json::json!({ "contractor_party": "initech" })));
	}

	#[test]
	fn inequalities_are_all_required() {
		let predicate = Predicate::new(vec![
			FilterTerm::eq("contract_type", "service_agreement"),
			FilterTerm::ne("governing_law", "alabama"),
		]);

		assert!(predicate.matches(&serde_json::json!({
			"contract_type": "service_agreement",
			"governing_law": "delaware",
		})));
		assert!(!predicate.matches(&serde_json::json!({
			"contract_type": "service_agreement",
			"governing_law": "alabama",
		})));
	}

	#[test]
	fn empty_predicate_matches_everything() {
		assert!(Predicate::default().matches(&serde_json::json!({ "anything": 1 })));
	}
}
