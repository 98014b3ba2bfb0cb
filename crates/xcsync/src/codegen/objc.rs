//! Objective-C header and implementation templates

use std::fmt::Write;

use xcsync_types::{Action, TypeMapping};

use super::{CodegenError, check_identifier};

const BANNER: &str = "\
// WARNING
// This file has been generated automatically by xcsync to mirror C# types.
// Changes made in the Xcode designer are synchronized back to C#, but more
// complex manual changes may not transfer correctly.
";

/// Name of the generated header for a mapping
pub fn header_file_name(mapping: &TypeMapping) -> String {
    format!("{}.h", mapping.native_id)
}

/// Name of the generated implementation file for a mapping
pub fn implementation_file_name(mapping: &TypeMapping) -> String {
    format!("{}.m", mapping.native_id)
}

fn pointer(native_type: &str) -> String {
    if native_type == "id" {
        "id".to_string()
    } else {
        format!("{native_type} *")
    }
}

/// `- (IBAction)move:(id)sender to:(NSView *)target`
fn method_signature(action: &Action) -> Result<String, CodegenError> {
    let mut signature = "- (IBAction)".to_string();
    if action.parameters.is_empty() {
        check_identifier(action.selector.trim_end_matches(':'))?;
        signature.push_str(action.selector.trim_end_matches(':'));
        return Ok(signature);
    }

    let parts = action.selector_parts();
    if parts.len() != action.parameters.len() {
        return Err(CodegenError::SelectorMismatch {
            selector: action.selector.clone(),
            parameters: action.parameters.len(),
        });
    }
    for (i, (part, parameter)) in parts.iter().zip(&action.parameters).enumerate() {
        check_identifier(part)?;
        check_identifier(&parameter.native_name)?;
        if i > 0 {
            signature.push(' ');
        }
        let _ = write!(
            signature,
            "{part}:({}){}",
            pointer(&parameter.native_type),
            parameter.native_name
        );
    }
    Ok(signature)
}

/// Generate the `.h` file for a mapping
pub fn header(mapping: &TypeMapping) -> Result<String, CodegenError> {
    check_identifier(&mapping.native_id)?;
    let base = mapping
        .base
        .as_ref()
        .ok_or_else(|| CodegenError::MissingBase(mapping.managed_id.clone()))?;

    let mut out = String::from(BANNER);
    out.push('\n');
    for framework in &mapping.frameworks {
        let _ = writeln!(out, "#import <{framework}/{framework}.h>");
    }
    if base.is_source() {
        let _ = writeln!(out, "#import \"{}.h\"", base.native_id);
    }
    out.push('\n');

    let _ = writeln!(out, "@interface {} : {} {{\n}}", mapping.native_id, base.native_id);

    for outlet in &mapping.outlets {
        check_identifier(&outlet.native_name)?;
        out.push('\n');
        if outlet.is_collection {
            let _ = writeln!(
                out,
                "@property (nonatomic, retain) IBOutletCollection({}) NSArray *{};",
                outlet.native_type, outlet.native_name
            );
        } else {
            let _ = writeln!(
                out,
                "@property (nonatomic, retain) IBOutlet {} *{};",
                outlet.native_type, outlet.native_name
            );
        }
    }

    for action in &mapping.actions {
        let _ = writeln!(out, "\n{};", method_signature(action)?);
    }

    out.push_str("\n@end\n");
    Ok(out)
}

/// Generate the `.m` file for a mapping
pub fn implementation(mapping: &TypeMapping) -> Result<String, CodegenError> {
    check_identifier(&mapping.native_id)?;

    let mut out = String::from(BANNER);
    let _ = writeln!(out, "\n#import \"{}\"\n", header_file_name(mapping));
    let _ = writeln!(out, "@implementation {}", mapping.native_id);

    for outlet in &mapping.outlets {
        check_identifier(&outlet.native_name)?;
        let _ = writeln!(
            out,
            "\n@synthesize {0} = _{0};",
            outlet.native_name
        );
    }

    for action in &mapping.actions {
        let _ = writeln!(out, "\n{} {{\n}}", method_signature(action)?);
    }

    out.push_str("\n@end\n");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use xcsync_types::{MappingOrigin, Outlet, Parameter};

    fn source_origin(file: &str) -> MappingOrigin {
        MappingOrigin::Source {
            file: PathBuf::from(file),
            designer_file: None,
        }
    }

    fn view_controller() -> TypeMapping {
        let root = Arc::new(TypeMapping::new("Foundation.NSObject", "NSObject"));
        let responder = Arc::new(TypeMapping::new("AppKit.NSResponder", "NSResponder").with_base(root));
        let base = Arc::new(
            TypeMapping::new("AppKit.NSViewController", "NSViewController")
                .with_base(responder)
                .with_framework("AppKit"),
        );
        TypeMapping::new("Sample.ViewController", "ViewController")
            .with_base(base)
            .with_origin(source_origin("ViewController.cs"))
            .with_framework("AppKit")
            .with_framework("Foundation")
            .with_outlets(vec![Outlet::new("FileLabel", "AppKit.NSTextField", "NSTextField")])
            .with_actions(vec![Action::new("UploadButton", "UploadButton:").with_parameter(
                Parameter::new("sender", "Foundation.NSObject", "id"),
            )])
    }

    #[test]
    fn test_view_controller_header() {
        let expected = format!(
            "{BANNER}
#import <AppKit/AppKit.h>
#import <Foundation/Foundation.h>

@interface ViewController : NSViewController {{
}}

@property (nonatomic, retain) IBOutlet NSTextField *FileLabel;

- (IBAction)UploadButton:(id)sender;

@end
"
        );
        assert_eq!(header(&view_controller()).unwrap(), expected);
    }

    #[test]
    fn test_view_controller_implementation() {
        let expected = format!(
            "{BANNER}
#import \"ViewController.h\"

@implementation ViewController

@synthesize FileLabel = _FileLabel;

- (IBAction)UploadButton:(id)sender {{
}}

@end
"
        );
        assert_eq!(implementation(&view_controller()).unwrap(), expected);
    }

    #[test]
    fn test_source_base_and_collections() {
        let base = Arc::new(
            TypeMapping::new("Sample.BaseController", "BaseController")
                .with_base(Arc::new(TypeMapping::new("Foundation.NSObject", "NSObject")))
                .with_origin(source_origin("BaseController.cs")),
        );
        let mapping = TypeMapping::new("Sample.Gallery", "Gallery")
            .with_base(base)
            .with_origin(source_origin("Gallery.cs"))
            .with_outlets(vec![
                Outlet::new("Images", "AppKit.NSImageView", "NSImageView").collection(),
            ])
            .with_actions(vec![
                Action::new("Move", "move:to:")
                    .with_parameter(Parameter::new("sender", "Foundation.NSObject", "id"))
                    .with_parameter(Parameter::new("target", "AppKit.NSView", "NSView")),
            ]);

        let text = header(&mapping).unwrap();
        assert!(text.contains("#import \"BaseController.h\"\n"));
        assert!(text.contains("@interface Gallery : BaseController {\n}\n"));
        assert!(text.contains(
            "@property (nonatomic, retain) IBOutletCollection(NSImageView) NSArray *Images;\n"
        ));
        assert!(text.contains("- (IBAction)move:(id)sender to:(NSView *)target;\n"));
    }

    #[test]
    fn test_errors() {
        let orphan = TypeMapping::new("Sample.Orphan", "Orphan");
        assert!(matches!(header(&orphan), Err(CodegenError::MissingBase(_))));

        let mut bad = view_controller();
        bad.native_id = "View Controller".to_string();
        assert!(matches!(
            header(&bad),
            Err(CodegenError::InvalidIdentifier(name)) if name == "View Controller"
        ));

        let mut mismatch = view_controller();
        mismatch.actions[0].selector = "upload:with:".to_string();
        assert!(matches!(
            implementation(&mismatch),
            Err(CodegenError::SelectorMismatch { parameters: 1, .. })
        ));
    }
}
