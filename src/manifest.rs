//! Kernel manifest: what the backend needs to launch each kernel.
//!
//! One record per registry entry, in id order: the kernel's name and
//! module, its parameters (those marked `no_codegen` are passed by the
//! runtime and never materialized), the byte layout of its carrier, and
//! a content hash of the printed kernel so stale device binaries can be
//! detected.

use crate::ir::display::{print_function, type_name};
use crate::ir::{FnId, Program, Type};
use crate::outline::layout::CarrierLayout;
use crate::outline::registry::{KernelOrigin, KernelRegistry};

#[derive(Clone, Debug)]
pub struct KernelManifest {
    pub kernels: Vec<KernelRecord>,
    pub compiler_version: String,
}

#[derive(Clone, Debug)]
pub struct KernelRecord {
    pub id: u32,
    pub name: String,
    pub module: String,
    pub origin: KernelOrigin,
    pub params: Vec<ParamRecord>,
    pub carrier: Option<CarrierLayout>,
    /// blake3 of the printed kernel, hex.
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamRecord {
    pub name: String,
    pub ty: String,
    pub no_codegen: bool,
}

impl KernelManifest {
    pub fn build(program: &Program, registry: &KernelRegistry) -> Self {
        let kernels = registry
            .iter()
            .map(|entry| record(program, entry.id, entry.func, entry.origin))
            .collect();
        Self {
            kernels,
            compiler_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn record(program: &Program, id: u32, f: FnId, origin: KernelOrigin) -> KernelRecord {
    let func = program.func(f);
    let params = func
        .formals
        .iter()
        .map(|&s| {
            let sym = program.sym(s);
            ParamRecord {
                name: sym.name.clone(),
                ty: type_name(program, &sym.ty),
                no_codegen: sym.flags.no_codegen,
            }
        })
        .collect();
    let module = program.module(program.module_of(func.parent)).name.clone();
    let hash = blake3::hash(print_function(program, f).as_bytes()).to_hex().to_string();
    KernelRecord {
        id,
        name: func.name.clone(),
        module,
        origin,
        params,
        carrier: carrier_of(program, f),
        hash,
    }
}

/// A bundled kernel takes `(void* bundle, Carrier carrier, ...)`.
fn carrier_of(program: &Program, f: FnId) -> Option<CarrierLayout> {
    let formals = &program.func(f).formals;
    let first = program.sym(*formals.first()?);
    let second = program.sym(*formals.get(1)?);
    match (&first.ty, &second.ty) {
        (Type::CVoidPtr, Type::Class(t)) => Some(CarrierLayout::of(program, *t)),
        _ => None,
    }
}

// ─── JSON Serialization ────────────────────────────────────────────

impl KernelManifest {
    /// Serialize to JSON (hand-rolled, no serde dependency).
    pub fn to_json(&self) -> String {
        let mut out = String::from("{\n");
        out.push_str(&format!(
            "  \"compiler_version\": {},\n",
            json_string(&self.compiler_version)
        ));
        out.push_str("  \"kernels\": [\n");
        for (i, k) in self.kernels.iter().enumerate() {
            out.push_str("    {\n");
            out.push_str(&format!("      \"id\": {},\n", k.id));
            out.push_str(&format!("      \"name\": {},\n", json_string(&k.name)));
            out.push_str(&format!("      \"module\": {},\n", json_string(&k.module)));
            out.push_str(&format!("      \"origin\": {},\n", json_string(k.origin.as_str())));

            out.push_str("      \"params\": [");
            let params: Vec<String> = k
                .params
                .iter()
                .map(|p| {
                    format!(
                        "{{ \"name\": {}, \"type\": {}, \"no_codegen\": {} }}",
                        json_string(&p.name),
                        json_string(&p.ty),
                        p.no_codegen
                    )
                })
                .collect();
            out.push_str(&params.join(", "));
            out.push_str("],\n");

            match &k.carrier {
                Some(layout) => {
                    out.push_str("      \"carrier\": {\n");
                    out.push_str(&format!("        \"name\": {},\n", json_string(&layout.name)));
                    out.push_str(&format!("        \"size\": {},\n", layout.size));
                    out.push_str(&format!("        \"align\": {},\n", layout.align));
                    out.push_str("        \"fields\": [");
                    let fields: Vec<String> = layout
                        .fields
                        .iter()
                        .map(|f| {
                            format!(
                                "{{ \"name\": {}, \"type\": {}, \"kind\": {}, \"offset\": {}, \"size\": {} }}",
                                json_string(&f.name),
                                json_string(&f.type_name),
                                json_string(f.kind.as_str()),
                                f.offset,
                                f.size
                            )
                        })
                        .collect();
                    out.push_str(&fields.join(", "));
                    out.push_str("]\n");
                    out.push_str("      },\n");
                }
                None => out.push_str("      \"carrier\": null,\n"),
            }

            out.push_str(&format!("      \"hash\": {}\n", json_string(&k.hash)));
            let comma = if i + 1 < self.kernels.len() { "," } else { "" };
            out.push_str(&format!("    }}{}\n", comma));
        }
        out.push_str("  ]\n");
        out.push_str("}\n");
        out
    }
}

/// JSON-escape a string and wrap in quotes.
fn json_string(s: &str) -> String {
    let mut out = String::from('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OffloadOptions;
    use crate::outline::outline_program;
    use crate::syntax::parse_program;

    const SRC: &str = r#"
module demo {
    var A: [real];
    fn scale(a: real, n: int) @offload {
        var i: int;
        for @order_independent (i := 0; i < n; i += 1) {
            A[i] = a * A[i];
        }
    }
}
"#;

    fn manifest(src: &str) -> KernelManifest {
        let mut p = parse_program("m.oir", src).expect("parses");
        let result = outline_program(&mut p, &OffloadOptions::default()).expect("pass succeeds");
        KernelManifest::build(&p, &result.registry)
    }

    #[test]
    fn test_records_follow_the_calling_convention() {
        let m = manifest(SRC);
        assert_eq!(m.kernels.len(), 1);
        let k = &m.kernels[0];
        assert_eq!((k.id, k.name.as_str(), k.module.as_str()), (0, "gpu_kernel0", "demo"));
        assert_eq!(k.origin, KernelOrigin::Loop);

        let names: Vec<&str> = k.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["_bundle", "_carrier", "_wkgrp_size_arg", "_wkitem_count_arg"]
        );
        assert!(k.params[0].no_codegen);
        assert!(!k.params[1].no_codegen);

        let carrier = k.carrier.as_ref().expect("bundled");
        assert!(carrier.name.starts_with("_class_locals_gpu_kernel0"));
        let fields: Vec<(&str, u32)> = carrier
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.offset))
            .collect();
        assert_eq!(fields, vec![("_0_A", 0), ("_1_a", 8)]);
        assert_eq!(carrier.size, 16);
    }

    #[test]
    fn test_hash_tracks_kernel_text() {
        let a = manifest(SRC);
        let b = manifest(SRC);
        assert_eq!(a.kernels[0].hash, b.kernels[0].hash);
        assert_eq!(a.kernels[0].hash.len(), 64);

        let changed = manifest(&SRC.replace("a * A[i]", "a + A[i]"));
        assert_ne!(a.kernels[0].hash, changed.kernels[0].hash);
    }

    #[test]
    fn test_json_shape() {
        let json = manifest(SRC).to_json();
        assert!(json.starts_with("{\n"));
        assert!(json.contains("\"name\": \"gpu_kernel0\""), "{}", json);
        assert!(json.contains("{ \"name\": \"_bundle\", \"type\": \"c_ptr\", \"no_codegen\": true }"), "{}", json);
        assert!(json.contains("\"kind\": \"handle\", \"offset\": 0, \"size\": 8"), "{}", json);
        assert!(json.contains("\"origin\": \"loop\""));
        assert!(json.trim_end().ends_with('}'));
    }

    #[test]
    fn test_json_string_escapes() {
        assert_eq!(json_string("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(json_string("\u{1}"), "\"\\u0001\"");
    }

    #[test]
    fn test_empty_manifest() {
        let p = Program::new();
        let m = KernelManifest::build(&p, &KernelRegistry::new());
        assert!(m.kernels.is_empty());
        assert!(m.to_json().contains("\"kernels\": [\n  ]"));
    }
}
