use std::collections::BTreeSet;

/// A model key paired with the alias it was finally assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasAssignment {
    pub model: String,
    pub alias: String,
}

/// Assign each `(model, candidate)` pair a unique alias.
///
/// A candidate that collides with a value in `used` (or with an alias
/// assigned earlier in the same batch) gets the first free integer suffix
/// starting at `2`. Repeated model keys keep their first assignment.
///
/// ```
/// use postfix_patcher::alias::resolve_collisions;
///
/// let assigned = resolve_collisions(
///     vec![("gpt-5".to_string(), "g5".to_string())],
///     ["g5"],
/// );
/// assert_eq!(assigned[0].alias, "g52");
/// ```
pub fn resolve_collisions<I, U, S>(candidates: I, used: U) -> Vec<AliasAssignment>
where
    I: IntoIterator<Item = (String, String)>,
    U: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut taken: BTreeSet<String> = used.into_iter().map(Into::into).collect();
    let mut assigned_models: BTreeSet<String> = BTreeSet::new();
    let mut assignments = Vec::new();

    for (model, candidate) in candidates {
        if !assigned_models.insert(model.clone()) {
            continue;
        }

        let mut alias = candidate.clone();
        let mut suffix = 2usize;
        while taken.contains(&alias) {
            alias = format!("{candidate}{suffix}");
            suffix += 1;
        }

        taken.insert(alias.clone());
        assignments.push(AliasAssignment { model, alias });
    }

    assignments
}
