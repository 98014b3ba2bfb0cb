//! Managed designer fragment template
//!
//! The designer fragment is the `partial class` half that carries only the
//! registration attribute, outlet properties and action stubs.

use std::fmt::Write;

use xcsync_types::TypeMapping;

use super::{CodegenError, check_identifier};

const BANNER: &str = "\
// WARNING
//
// This file has been generated automatically by xcsync to store outlets and
// actions made in the UI designer. If it is removed, they will be lost.
// Manual changes to this file may not be handled correctly.
//
";

/// Generate the designer fragment for a mapping
pub fn designer(mapping: &TypeMapping) -> Result<String, CodegenError> {
    let class_name = mapping.managed_name();
    check_identifier(class_name)?;

    let mut out = String::from(BANNER);
    out.push_str("using Foundation;\nusing System.CodeDom.Compiler;\n\n");

    let indent = match mapping.namespace() {
        Some(namespace) => {
            let _ = writeln!(out, "namespace {namespace}\n{{");
            "\t"
        }
        None => "",
    };

    let _ = writeln!(out, "{indent}[Register (\"{}\")]", mapping.native_id);
    let _ = writeln!(out, "{indent}partial class {class_name}\n{indent}{{");

    for outlet in &mapping.outlets {
        check_identifier(&outlet.managed_name)?;
        if outlet.native_name == outlet.managed_name {
            let _ = writeln!(out, "{indent}\t[Outlet]");
        } else {
            let _ = writeln!(out, "{indent}\t[Outlet (\"{}\")]", outlet.native_name);
        }
        let suffix = if outlet.is_collection { "[]" } else { "" };
        let _ = writeln!(
            out,
            "{indent}\t{}{suffix} {} {{ get; set; }}\n",
            outlet.managed_type, outlet.managed_name
        );
    }

    for action in &mapping.actions {
        check_identifier(&action.managed_name)?;
        let parameters = action
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.managed_type, p.managed_name))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "{indent}\t[Action (\"{}\")]", action.selector);
        let _ = writeln!(
            out,
            "{indent}\tpartial void {} ({parameters});\n",
            action.managed_name
        );
    }

    let _ = writeln!(out, "{indent}\tvoid ReleaseDesignerOutlets ()\n{indent}\t{{\n{indent}\t}}");
    let _ = writeln!(out, "{indent}}}");
    if !indent.is_empty() {
        out.push_str("}\n");
    }
    Ok(out)
}

/// Number of classes declared in a designer file
///
/// Write-back is only safe when the file holds exactly one class.
pub fn declared_class_count(source: &str) -> usize {
    source
        .lines()
        .filter(|line| {
            let mut words = line.split_whitespace();
            while let Some(word) = words.next() {
                if word == "class" {
                    return words.next().is_some();
                }
                if !matches!(
                    word,
                    "public" | "internal" | "private" | "protected" | "partial" | "sealed"
                        | "abstract" | "static"
                ) {
                    return false;
                }
            }
            false
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use xcsync_types::{Action, MappingOrigin, Outlet, Parameter};

    fn mapping(managed_id: &str) -> TypeMapping {
        TypeMapping::new(managed_id, "ViewController")
            .with_base(Arc::new(TypeMapping::new("Foundation.NSObject", "NSObject")))
            .with_origin(MappingOrigin::Source {
                file: PathBuf::from("ViewController.cs"),
                designer_file: Some(PathBuf::from("ViewController.designer.cs")),
            })
            .with_outlets(vec![
                Outlet::new("FileLabel", "AppKit.NSTextField", "NSTextField"),
                Outlet::new("Images", "AppKit.NSImageView", "NSImageView")
                    .collection()
                    .with_native_name("images"),
            ])
            .with_actions(vec![Action::new("UploadButton", "UploadButton:").with_parameter(
                Parameter::new("sender", "Foundation.NSObject", "id"),
            )])
    }

    #[test]
    fn test_designer_fragment() {
        let expected = format!(
            "{BANNER}using Foundation;
using System.CodeDom.Compiler;

namespace Sample
{{
\t[Register (\"ViewController\")]
\tpartial class ViewController
\t{{
\t\t[Outlet]
\t\tAppKit.NSTextField FileLabel {{ get; set; }}

\t\t[Outlet (\"images\")]
\t\tAppKit.NSImageView[] Images {{ get; set; }}

\t\t[Action (\"UploadButton:\")]
\t\tpartial void UploadButton (Foundation.NSObject sender);

\t\tvoid ReleaseDesignerOutlets ()
\t\t{{
\t\t}}
\t}}
}}
"
        );
        assert_eq!(designer(&mapping("Sample.ViewController")).unwrap(), expected);
    }

    #[test]
    fn test_global_namespace() {
        let text = designer(&mapping("ViewController")).unwrap();
        assert!(!text.contains("namespace"));
        assert!(text.contains("\n[Register (\"ViewController\")]\npartial class ViewController\n{\n"));
        assert!(text.ends_with("\t}\n}\n"));
    }

    #[test]
    fn test_declared_class_count() {
        let single = designer(&mapping("Sample.ViewController")).unwrap();
        assert_eq!(declared_class_count(&single), 1);

        let double = format!("{single}\nnamespace Other {{\n\tpublic partial class Extra\n\t{{\n\t}}\n}}\n");
        assert_eq!(declared_class_count(&double), 2);
        assert_eq!(declared_class_count("// a class comment\nvar x = 1;"), 0);
    }
}
