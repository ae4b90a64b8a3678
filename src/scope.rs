use serde_json::{Map, Value};

/// Names visible to an expression while it is evaluated.
///
/// Constants shadow variables of the same name; the variable map is whatever
/// the builder has resolved so far.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    constants: &'a Map<String, Value>,
    variables: &'a Map<String, Value>,
}

impl<'a> Scope<'a> {
    pub fn new(constants: &'a Map<String, Value>, variables: &'a Map<String, Value>) -> Self {
        Self {
            constants,
            variables,
        }
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.constants
            .get(name)
            .or_else(|| self.variables.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn constants(&self) -> &'a Map<String, Value> {
        self.constants
    }

    pub fn variables(&self) -> &'a Map<String, Value> {
        self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constants_shadow_variables() {
        let constants = json!({"PI": 3.14}).as_object().cloned().unwrap();
        let variables = json!({"PI": 3.2, "r": 2}).as_object().cloned().unwrap();
        let scope = Scope::new(&constants, &variables);
        assert_eq!(scope.get("PI"), Some(&json!(3.14)));
        assert_eq!(scope.get("r"), Some(&json!(2)));
        assert!(!scope.contains("dne"));
    }
}
