use manifest_objects::models::*;
use serde_json::json;
use speculate2::speculate;

speculate! {
    describe "identifier parsing" {
        before {
            let provider = IdentifierProvider::new("default");
        }

        it "splits a composite id into space and key" {
            let id = provider.parse("space:key");
            assert_eq!(id.key(), "key");
            assert_eq!(id.space(), "space");
            assert_eq!(id.defined_space(), Some("space"));
        }

        it "puts a bare key in the default space without defining one" {
            let id = provider.parse("bareKey");
            assert_eq!(id.key(), "bareKey");
            assert_eq!(id.space(), "default");
            assert_eq!(id.defined_space(), None);
        }

        it "treats an empty space as defined" {
            let id = provider.parse(":key");
            assert_eq!(id.space(), "");
            assert_eq!(id.defined_space(), Some(""));
            assert_eq!(id.key(), "key");
        }

        it "keeps later separators in the key" {
            let id = provider.parse("a:b:c");
            assert_eq!(id.space(), "a");
            assert_eq!(id.key(), "b:c");
        }

        it "generates unique ids in the requested space" {
            let first = provider.generate(Some("local"));
            let second = provider.generate(Some("local"));
            assert_ne!(first, second);
            assert!(first.starts_with("local:"));
            assert_eq!(provider.parse(&first).space(), "local");
        }
    }

    describe "models" {
        it "reads the well-known fields" {
            let model = Model::from_value(json!({
                "name": "Battery",
                "type": "telemetry",
                "modified": 42,
                "persisted": 40,
                "composition": ["mct:a", "mct:b"]
            })).expect("valid model");

            assert_eq!(model.name(), Some("Battery"));
            assert_eq!(model.type_key(), Some("telemetry"));
            assert_eq!(model.modified(), Some(42));
            assert_eq!(model.persisted(), Some(40));
            assert_eq!(model.composition(), Some(vec!["mct:a".to_string(), "mct:b".to_string()]));
        }

        it "is not a container without a composition array" {
            let model = Model::new().with("name", "Leaf");
            assert!(!model.has_composition());
            assert_eq!(model.composition(), None);
        }

        it "carries unknown fields through serialization" {
            let model = Model::new().with("name", "Plot").with("axes", json!({"x": "time"}));
            let text = serde_json::to_string(&model).expect("serializes");
            let back: Model = serde_json::from_str(&text).expect("deserializes");
            assert_eq!(back.get("axes"), Some(&json!({"x": "time"})));
        }
    }
}
