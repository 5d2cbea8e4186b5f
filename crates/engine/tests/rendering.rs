use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use anyhow::anyhow;
use serde_json::{Value, json};
use stencil_engine::{
    Engine, EngineConfig, EngineError, EvalContext, Expression, NamespaceResolver, Outcome, ResolutionError, Resolved, ResultMapper,
    ResultValue, ValueResolver,
};

fn engine() -> Engine {
    Engine::builder().add_defaults().config(EngineConfig::default()).build()
}

#[test]
fn renders_explicit_data_on_fresh_instances() {
    let template = engine().parse("Hello {foo}!").unwrap();
    assert_eq!(template.instance().set("foo", "bar").render().unwrap(), "Hello bar!");
    assert_eq!(template.instance().set("foo", "baz").render().unwrap(), "Hello baz!");
}

#[test]
fn unset_keys_render_the_missing_value() {
    let template = engine().parse("[{first}|{second}]").unwrap();
    assert_eq!(template.instance().set("first", 1).render().unwrap(), "[1|]");

    let engine = Engine::builder()
        .config(EngineConfig {
            missing_value: "?".into(),
            ..EngineConfig::default()
        })
        .build();
    let template = engine.parse("[{first}|{second}]").unwrap();
    assert_eq!(template.instance().set("second", true).render().unwrap(), "[?|true]");
}

#[test]
fn strict_rendering_fails_on_missing_values() {
    let engine = Engine::builder()
        .config(EngineConfig {
            strict_rendering: true,
            ..EngineConfig::default()
        })
        .build();
    let error = engine.parse("{present} {absent}").unwrap().instance().set("present", 1).render().unwrap_err();
    assert!(matches!(error, EngineError::Render(ResolutionError::PropertyNotFound { ref expression, .. }) if expression == "absent"));
}

#[test]
fn explicit_data_wins_over_computed_binding() {
    let bar_supplier_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&bar_supplier_ran);
    let template = engine().parse("Hello {foo} and {bar}!").unwrap();
    let instance = template.instance();
    instance
        .set_computed("foo", |key| Resolved::value(key.to_uppercase()))
        .set_computed("bar", move |key| {
            flag.store(true, Ordering::SeqCst);
            Resolved::value(key.len())
        })
        .set("bar", 30);
    assert_eq!(instance.render().unwrap(), "Hello FOO and 30!");
    assert!(!bar_supplier_ran.load(Ordering::SeqCst));
}

#[test]
fn computed_binding_is_memoized_within_a_render() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let template = engine().parse("{total}/{total}/{total.size}").unwrap();
    let instance = template.instance();
    instance.set_computed("total", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Resolved::pending(async { Ok(Resolved::value(json!([1, 2]))) })
    });
    assert_eq!(instance.render().unwrap(), "[1,2]/[1,2]/2");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn completion_callbacks_fire_once_in_order() {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let template = engine().parse("done").unwrap();
    let instance = template.instance();
    for label in ["first", "second", "third"] {
        let fired = Arc::clone(&fired);
        instance.on_complete(move || fired.lock().unwrap().push(label));
    }
    assert!(fired.lock().unwrap().is_empty());
    instance.render().unwrap();
    instance.render().unwrap();
    assert_eq!(*fired.lock().unwrap(), vec!["first", "second", "third"]);
}

#[derive(Debug)]
struct Failing;

impl ValueResolver for Failing {
    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        context.is_top_level() && context.name() == "explode"
    }

    fn resolve(&self, _context: &EvalContext<'_>) -> Outcome {
        Outcome::Resolved(Resolved::pending(async { Err(anyhow!("kaboom")) }))
    }
}

#[test]
fn resolver_failure_aborts_render_without_callbacks() {
    let engine = Engine::builder().add_value_resolver(Failing).config(EngineConfig::default()).build();
    let template = engine.register("boom", "line one\n{explode}").unwrap();
    let instance = template.instance();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    instance.on_complete(move || flag.store(true, Ordering::SeqCst));

    let error = instance.render().unwrap_err();
    let EngineError::Render(ResolutionError::ResolverFailure { expression, origin, source }) = error else {
        panic!("expected resolver failure");
    };
    assert_eq!(expression, "explode");
    assert_eq!((origin.template_id.as_str(), origin.line), ("boom", 2));
    assert_eq!(source.to_string(), "kaboom");
    assert!(!fired.load(Ordering::SeqCst));
}

#[test]
fn unregistered_namespace_fails_the_render() {
    let template = engine().parse("{ok} {nope:thing}").unwrap();
    let instance = template.instance();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    instance.set("ok", 1).on_complete(move || flag.store(true, Ordering::SeqCst));
    let error = instance.render().unwrap_err();
    assert!(matches!(error, EngineError::Render(ResolutionError::NamespaceUnresolved { ref namespace, .. }) if namespace == "nope"));
    assert!(!fired.load(Ordering::SeqCst));
}

#[derive(Debug)]
struct Config;

impl NamespaceResolver for Config {
    fn namespace(&self) -> &str {
        "cfg"
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        match (context.name(), context.arguments()) {
            ("region", []) => Outcome::value("eu-west"),
            ("limits", []) => Outcome::value(json!({"cpu": 4})),
            ("label", [Value::String(prefix)]) => Outcome::value(format!("{prefix}-eu")),
            _ => Outcome::Declined,
        }
    }
}

#[test]
fn namespaced_expressions_route_to_namespace_resolvers() {
    let engine = Engine::builder().add_defaults().add_namespace_resolver(Config).config(EngineConfig::default()).build();
    let template = engine.parse("{cfg:region} {cfg:limits.cpu} {cfg:label(name)} [{cfg:unknown}]").unwrap();
    assert_eq!(template.instance().set("name", "app").render().unwrap(), "eu-west 4 app-eu []");
}

#[derive(Debug)]
struct Delayed;

impl ValueResolver for Delayed {
    fn priority(&self) -> i32 {
        10
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        if !context.is_top_level() || context.name() != "slow" {
            return Outcome::Declined;
        }
        Outcome::Resolved(Resolved::pending(async {
            tokio::task::yield_now().await;
            Ok(Resolved::completed(Ok(Resolved::pending(async { Ok(Resolved::value(json!({"answer": 42}))) }))))
        }))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn nested_async_values_are_flattened() {
    let engine = Engine::builder().add_defaults().add_value_resolver(Delayed).config(EngineConfig::default()).build();
    let template = engine.parse("{slow.answer}:{slow.answer.or(0)}").unwrap();
    assert_eq!(template.instance().render_async().await.unwrap(), "42:42");
    assert_eq!(template.instance().render().unwrap(), "42:42");
}

#[derive(Debug)]
struct ForeignLookup;

impl ValueResolver for ForeignLookup {
    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        context.is_top_level() && context.name() == "remote"
    }

    fn resolve(&self, _context: &EvalContext<'_>) -> Outcome {
        Outcome::Resolved(Resolved::foreign(async { Ok::<_, std::io::Error>(json!("fetched")) }))
    }
}

#[tokio::test]
async fn foreign_futures_follow_the_unrestricted_flag() {
    let restricted = Engine::builder().add_value_resolver(ForeignLookup).config(EngineConfig::default()).build();
    let error = restricted.parse("{remote}").unwrap().instance().render_async().await.unwrap_err();
    assert!(matches!(error, EngineError::Render(ResolutionError::ForeignAsyncValue { .. })));

    let unrestricted = Engine::builder()
        .add_value_resolver(ForeignLookup)
        .config(EngineConfig {
            unrestricted_async_values: true,
            ..EngineConfig::default()
        })
        .build();
    assert_eq!(unrestricted.parse("{remote}").unwrap().instance().render_async().await.unwrap(), "fetched");
}

#[derive(Debug)]
struct AsyncDecline;

impl ValueResolver for AsyncDecline {
    fn priority(&self) -> i32 {
        5
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        if context.is_top_level() {
            return Outcome::Declined;
        }
        Outcome::Resolved(Resolved::pending(async { Ok(Resolved::NotFound) }))
    }
}

#[test]
fn resolvers_settling_to_not_found_pass_the_turn() {
    let engine = Engine::builder().add_defaults().add_value_resolver(AsyncDecline).config(EngineConfig::default()).build();
    let template = engine.parse("{user.name}").unwrap();
    assert_eq!(template.instance().set("user", json!({"name": "Ada"})).render().unwrap(), "Ada");
}

#[derive(Debug)]
struct Named(&'static str, i32);

impl ValueResolver for Named {
    fn priority(&self) -> i32 {
        self.1
    }

    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        context.is_top_level() && context.name() == "who"
    }

    fn resolve(&self, _context: &EvalContext<'_>) -> Outcome {
        Outcome::value(self.0)
    }
}

#[test]
fn resolver_priority_and_registration_order() {
    let engine = Engine::builder()
        .add_value_resolver(Named("low", 1))
        .add_value_resolver(Named("tie-a", 3))
        .add_value_resolver(Named("tie-b", 3))
        .config(EngineConfig::default())
        .build();
    assert_eq!(engine.parse("{who}").unwrap().instance().render().unwrap(), "tie-a");
}

#[derive(Debug)]
struct PriceMapper;

impl ResultMapper for PriceMapper {
    fn map(&self, value: &ResultValue, expression: &Expression) -> anyhow::Result<Option<String>> {
        let is_price = expression.parts().last().is_some_and(|part| part.name() == "price");
        Ok(match value {
            ResultValue::Value(Value::Number(amount)) if is_price => amount.as_f64().map(|amount| format!("{amount:.2} EUR")),
            _ => None,
        })
    }
}

#[test]
fn mappers_format_by_originating_expression() {
    let engine = Engine::builder().add_defaults().add_result_mapper(PriceMapper).config(EngineConfig::default()).build();
    let template = engine.parse("{item.name}: {item.price} x{item.count}").unwrap();
    let output = template
        .instance()
        .set("item", json!({"name": "Tea", "price": 3.5, "count": 2}))
        .render()
        .unwrap();
    assert_eq!(output, "Tea: 3.50 EUR x2");
}

#[derive(Debug)]
struct RejectingMapper;

impl ResultMapper for RejectingMapper {
    fn map(&self, value: &ResultValue, _expression: &Expression) -> anyhow::Result<Option<String>> {
        match value {
            ResultValue::Value(Value::String(text)) if text.contains('<') => Err(anyhow!("markup is not allowed")),
            _ => Ok(None),
        }
    }
}

#[test]
fn mapper_failure_aborts_render_without_callbacks() {
    let engine = Engine::builder().add_result_mapper(RejectingMapper).config(EngineConfig::default()).build();
    let template = engine.register("page", "{title}\n{body}").unwrap();
    let instance = template.instance();
    let fired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fired);
    instance.on_complete(move || flag.store(true, Ordering::SeqCst)).set("title", "News").set("body", "<b>hi</b>");

    let error = instance.render().unwrap_err();
    let EngineError::Render(ResolutionError::MapperFailure { expression, origin, source }) = error else {
        panic!("expected mapper failure");
    };
    assert_eq!(expression, "body");
    assert_eq!((origin.template_id.as_str(), origin.line), ("page", 2));
    assert_eq!(source.to_string(), "markup is not allowed");
    assert!(!fired.load(Ordering::SeqCst));
}

#[derive(Debug)]
struct Recording(Arc<Mutex<Vec<String>>>);

impl ValueResolver for Recording {
    fn priority(&self) -> i32 {
        10
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        if !context.is_top_level() {
            self.0.lock().unwrap().push(context.name().to_string());
        }
        Outcome::Declined
    }
}

#[derive(Debug)]
struct FailingArgument;

impl ValueResolver for FailingArgument {
    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        context.is_top_level() && context.name() == "boom"
    }

    fn resolve(&self, _context: &EvalContext<'_>) -> Outcome {
        Outcome::Resolved(Resolved::failed(anyhow!("no index available")))
    }
}

#[test]
fn failing_argument_fails_the_method_and_skips_later_parts() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let engine = Engine::builder()
        .add_defaults()
        .add_value_resolver(Recording(Arc::clone(&seen)))
        .add_value_resolver(FailingArgument)
        .config(EngineConfig::default())
        .build();
    let instance = engine.parse("{items.get(boom).size}").unwrap().instance();
    instance.set("items", json!([[1, 2]]));

    let error = instance.render().unwrap_err();
    assert!(matches!(error, EngineError::Render(ResolutionError::ResolverFailure { ref expression, .. }) if expression == "boom"));
    assert!(seen.lock().unwrap().is_empty(), "later parts were resolved: {:?}", seen.lock().unwrap());
}

#[test]
fn initializers_run_per_instance_and_attributes_stay_private() {
    let engine = Engine::builder()
        .add_defaults()
        .add_instance_initializer(|instance| {
            instance.set_attribute("locale", "de".to_string());
            instance.set("greeting", "Hallo");
        })
        .config(EngineConfig::default())
        .build();
    let template = engine.parse("{greeting} [{locale}]").unwrap();
    let instance = template.instance();
    assert_eq!(instance.get_attribute::<String>("locale").as_deref(), Some("de"));
    assert_eq!(instance.get_attribute::<u32>("locale"), None);
    assert_eq!(instance.template().generated_id(), template.generated_id());
    assert_eq!(instance.render().unwrap(), "Hallo []");
}

#[derive(Debug)]
struct Recorder;

impl ValueResolver for Recorder {
    fn applies_to(&self, context: &EvalContext<'_>) -> bool {
        context.is_top_level() && context.name() == "remember"
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        context.data().set("remembered", "yes");
        Outcome::value("ok")
    }
}

#[test]
fn data_set_mid_render_is_visible_to_later_lookups() {
    let engine = Engine::builder().add_value_resolver(Recorder).config(EngineConfig::default()).build();
    let template = engine.parse("{remember} {remembered}").unwrap();
    assert_eq!(template.instance().render().unwrap(), "ok yes");
}

#[test]
fn virtual_methods_take_evaluated_arguments() {
    let template = engine()
        .parse("{items.get(index)} {items.contains('b')} {name.or('anonymous')} {name.toUpperCase.length}")
        .unwrap();
    let output = template
        .instance()
        .set("items", json!(["a", "b", "c"]))
        .set("index", 2)
        .set("name", Value::Null)
        .render()
        .unwrap();
    assert_eq!(output, "c true anonymous ");
}

#[test]
fn literal_only_templates_render_without_data() {
    let template = engine().parse("{'quoted'} {42} {true} {null}!").unwrap();
    assert_eq!(template.instance().render().unwrap(), "quoted 42 true !");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_renders_use_independent_instances() {
    let template = engine().parse("{who}").unwrap();
    let handles: Vec<_> = (0..8)
        .map(|index| {
            let template = template.clone();
            tokio::spawn(async move {
                let instance = template.instance();
                instance.set("who", index);
                instance.render_async().await
            })
        })
        .collect();
    for (index, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), index.to_string());
    }
}
