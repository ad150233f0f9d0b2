//! Attach rules to fields and force revalidation.

use crate::form::FieldHandle;
use crate::rule::Rule;

/// Replace each field's rules and recompute its validity right away.
///
/// `None` clears every rule. There is no diffing against the rules already
/// attached: assigning the same list twice recomputes twice and ends in the
/// same validity.
///
/// # Example
///
/// ```
/// use formwatch::{FormGroup, attach::set_validators, rule};
///
/// let form = FormGroup::builder().control("name", "", vec![]).build();
/// let name = form.control("name").unwrap();
/// assert!(name.is_valid());
///
/// set_validators([(&name, Some(vec![rule::required()]))]);
/// assert!(name.has_violation("required"));
///
/// set_validators([(&name, None)]);
/// assert!(name.is_valid());
/// ```
pub fn set_validators<'a, H, I>(assignments: I)
where
    H: FieldHandle + 'a,
    I: IntoIterator<Item = (&'a H, Option<Vec<Rule>>)>,
{
    for (field, rules) in assignments {
        field.set_rules(rules);
        field.update_validity();
    }
}
