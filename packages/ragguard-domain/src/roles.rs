use std::{
	borrow::Cow,
	collections::{BTreeMap, BTreeSet},
};

use crate::{Error, Result};

/// The "inherits" table plus display-name aliases. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
	inherits: BTreeMap<String, Vec<String>>,
	aliases: BTreeMap<String, String>,
}
impl RoleGraph {
	pub fn new(
		inherits: BTreeMap<String, Vec<String>>,
		aliases: BTreeMap<String, String>,
	) -> Self {
		Self { inherits, aliases }
	}

	pub fn from_config(cfg: &ragguard_config::Config) -> Self {
		let inherits = cfg
			.roles
			.iter()
			.map(|(name, definition)| (name.clone(), definition.inherits.clone()))
			.collect();

		Self::new(inherits, cfg.role_aliases.clone())
	}

	pub fn contains(&self, role: &str) -> bool {
		self.inherits.contains_key(role)
	}

	pub fn roles(&self) -> impl Iterator<Item = &str> {
		self.inherits.keys().map(String::as_str)
	}

	/// Resolves a requested role name to its canonical form: an alias maps to its target, a
	/// defined role maps to itself, and anything else is lowercased with spaces turned into
	/// underscores ("Finance Manager" becomes "finance_manager").
	pub fn canonical<'a>(&'a self, role: &'a str) -> Cow<'a, str> {
		if let Some(target) = self.aliases.get(role) {
			return Cow::Borrowed(target.as_str());
		}
		if self.contains(role) {
			return Cow::Borrowed(role);
		}

		Cow::Owned(role.trim().to_lowercase().replace(' ', "_"))
	}

	/// The starting role and every role reachable from it through "inherits" edges.
	///
	/// `role` must already be canonical; aliases are resolved only by [`Self::canonical`].
	/// Traversal uses an explicit stack and a visited set, so cyclic tables terminate. Parents
	/// without their own definition are still part of the result.
	pub fn expand(&self, role: &str) -> Result<BTreeSet<String>> {
		if !self.contains(role) {
			return Err(Error::UnknownRole { role: role.to_string() });
		}

		let mut effective = BTreeSet::new();
		let mut stack = vec![role];

		while let Some(current) = stack.pop() {
			if !effective.insert(current.to_string()) {
				continue;
			}

			let Some(parents) = self.inherits.get(current) else { continue };

			for parent in parents {
				if !effective.contains(parent) {
					stack.push(parent.as_str());
				}
			}
		}

		Ok(effective)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn graph(edges: &[(&str, &[&str])]) -> RoleGraph {
		let inherits = edges
			.iter()
			.map(|(role, parents)| {
				(role.to_string(), parents.iter().map(|parent| parent.to_string()).collect())
			})
			.collect();

		RoleGraph::new(inherits, BTreeMap::new())
	}

	fn set(roles: &[&str]) -> BTreeSet<String> {
		roles.iter().map(|role| role.to_string()).collect()
	}

	#[test]
	fn expands_transitively() {
		let graph = graph(&[
			("intern", &[]),
			("employee", &["intern"]),
			("manager", &["employee"]),
			("admin", &["manager"]),
		]);

		assert_eq!(
			graph.expand("admin").expect("admin is defined"),
			set(&["admin", "manager", "employee", "intern"])
		);
		assert_eq!(graph.expand("intern").expect("intern is defined"), set(&["intern"]));
	}

	#[test]
	fn tolerates_cycles() {
		let graph = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]);

		assert_eq!(graph.expand("b").expect("b is defined"), set(&["a", "b", "c"]));
	}

	#[test]
	fn includes_undefined_parents() {
		let graph = graph(&[("auditor", &["read_only"])]);

		assert_eq!(
			graph.expand("auditor").expect("auditor is defined"),
			set(&["auditor", "read_only"])
		);
	}

	#[test]
	fn unknown_role_is_an_error() {
		let graph = graph(&[("intern", &[])]);

		assert_eq!(graph.expand("ceo"), Err(Error::UnknownRole { role: "ceo".to_string() }));
	}

	fn aliased_graph() -> RoleGraph {
		let inherits = [
			("hr_manager".to_string(), vec!["employee".to_string()]),
			("employee".to_string(), Vec::new()),
			("admin".to_string(), vec!["hr_manager".to_string()]),
		]
		.into_iter()
		.collect();
		let aliases = [("HR Manager".to_string(), "hr_manager".to_string())].into_iter().collect();

		RoleGraph::new(inherits, aliases)
	}

	#[test]
	fn canonical_resolves_aliases() {
		let graph = aliased_graph();
		let canonical = graph.canonical("HR Manager");

		assert_eq!(canonical, "hr_manager");
		assert_eq!(
			graph.expand(&canonical).expect("alias resolves"),
			set(&["hr_manager", "employee"])
		);
	}

	#[test]
	fn canonical_falls_back_to_snake_case() {
		let graph = aliased_graph();

		assert_eq!(graph.canonical("Admin"), "admin");
		assert_eq!(graph.canonical(" Hr Manager "), "hr_manager");
		assert_eq!(graph.canonical("employee"), "employee");
		assert_eq!(graph.canonical("Chief Executive"), "chief_executive");
	}

	#[test]
	fn expand_does_not_resolve_aliases() {
		let graph = aliased_graph();

		assert_eq!(
			graph.expand("HR Manager"),
			Err(Error::UnknownRole { role: "HR Manager".to_string() })
		);
	}
}
