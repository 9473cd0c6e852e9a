use std::str::FromStr;

use sui_rpc::proto::sui::rpc::v2 as proto;
use sui_sdk_types as sui;

/// A fully-qualified on-chain object type this service expects to see
/// in transaction effects. Matching is structural (package address,
/// module, struct name), never a string-suffix comparison, so a
/// renamed or look-alike type from another package can not satisfy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedObjectType {
    package: sui::Address,
    module: String,
    name: String,
}

impl ExpectedObjectType {
    pub fn new(package: sui::Address, module: &str, name: &str) -> Self {
        Self {
            package,
            module: module.to_string(),
            name: name.to_string(),
        }
    }

    /// The canonical `package::module::Name` rendering
    pub fn canonical(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.name)
    }

    /// Structural comparison against a type string from transaction
    /// effects. Tolerates short-form package addresses and trailing
    /// generic parameters.
    pub fn matches(&self, object_type: &str) -> bool {
        let mut parts = object_type.splitn(3, "::");
        let (Some(package_str), Some(module), Some(rest)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        let Ok(package) = sui::Address::from_str(package_str) else {
            return false;
        };

        let name = rest.split('<').next().unwrap_or(rest);

        package == self.package && module == self.module && name == self.name
    }
}

/// Scan transaction effects for an object created by the transaction
/// whose type matches `expected`. Returns the object id.
pub fn find_created_object(
    effects: &proto::TransactionEffects,
    expected: &ExpectedObjectType,
) -> Option<String> {
    effects.changed_objects.iter().find_map(|change| {
        let created = change.id_operation
            == Some(proto::changed_object::IdOperation::Created as i32);
        if !created {
            return None;
        }
        let object_type = change.object_type.as_deref()?;
        if expected.matches(object_type) {
            change.object_id.clone()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> ExpectedObjectType {
        let package = sui::Address::from_str(
            "0x00000000000000000000000000000000000000000000000000000000000000ab",
        )
        .unwrap();
        ExpectedObjectType::new(package, "tales", "Tale")
    }

    fn changed(object_id: &str, object_type: &str, op: proto::changed_object::IdOperation) -> proto::ChangedObject {
        let mut change = proto::ChangedObject::default();
        change.object_id = Some(object_id.to_string());
        change.object_type = Some(object_type.to_string());
        change.id_operation = Some(op as i32);
        change
    }

    #[test]
    fn matches_canonical_and_short_form() {
        let expected = expected();
        assert!(expected.matches(
            "0x00000000000000000000000000000000000000000000000000000000000000ab::tales::Tale"
        ));
        assert!(expected.matches("0xab::tales::Tale"));
        assert!(expected.matches("0xab::tales::Tale<0x2::sui::SUI>"));
    }

    #[test]
    fn rejects_other_modules_and_packages() {
        let expected = expected();
        assert!(!expected.matches("0xab::tales::TaleCap"));
        assert!(!expected.matches("0xab::stories::Tale"));
        assert!(!expected.matches("0xcd::tales::Tale"));
        assert!(!expected.matches("garbage"));
        // Suffix look-alikes must not match
        assert!(!expected.matches("0xcd::wrapped::Tale"));
    }

    #[test]
    fn finds_only_created_objects_of_expected_type() {
        let mut effects = proto::TransactionEffects::default();
        effects.changed_objects = vec![
            changed("0x1", "0xab::tales::Tale", proto::changed_object::IdOperation::None),
            changed("0x2", "0x2::coin::Coin<0x2::sui::SUI>", proto::changed_object::IdOperation::Created),
            changed("0x3", "0xab::tales::Tale", proto::changed_object::IdOperation::Created),
        ];

        let found = find_created_object(&effects, &expected());
        assert_eq!(found.as_deref(), Some("0x3"));
    }

    #[test]
    fn absent_created_object_yields_none() {
        let effects = proto::TransactionEffects::default();
        assert!(find_created_object(&effects, &expected()).is_none());
    }
}
