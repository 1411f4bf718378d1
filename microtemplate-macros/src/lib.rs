use microtemplate_core::{Settings, compile_with};
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote};
use std::fs;
use std::path::Path;
use syn::{Ident, LitStr, Token, parse::Parse, parse::ParseStream, parse_macro_input};
use walkdir::WalkDir;

const EXTENSION: &str = "jst";

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c == '-' {
            result.push('_');
        } else if c.is_uppercase() {
            if i > 0 && !result.ends_with('_') {
                result.push('_');
            }
            for lc in c.to_lowercase() {
                result.push(lc);
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn generate_code_for_content(
    name: &str,
    content: &str,
    settings: &Settings,
    path_for_include: Option<&str>,
    span: Span,
) -> syn::Result<proc_macro2::TokenStream> {
    let method_name_str = to_snake_case(name);
    let method_name: Ident = syn::parse_str(&method_name_str).map_err(|_| {
        syn::Error::new(span, format!("`{method_name_str}` is not a valid function name"))
    })?;
    let source_name = format_ident!("{}_SOURCE", method_name_str.to_uppercase());

    // template errors become build errors
    let template = compile_with(content, settings)
        .map_err(|err| syn::Error::new(span, format!("template `{name}`: {err}")))?;
    let source = template.source();
    let doc = format!("Generated source of the `{name}` template");

    let include_bytes_stmt = if let Some(path_str) = path_for_include {
        quote! {
            // ensure the compiler is aware the output is linked to the source so that any changes
            // to the jst file will trigger a recompilation
            const _: &[u8] = include_bytes!(#path_str);
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        #include_bytes_stmt

        #[doc = #doc]
        pub const #source_name: &str = #source;

        pub fn #method_name() -> &'static ::microtemplate::Template {
            static TEMPLATE: ::std::sync::LazyLock<::microtemplate::Template> =
                ::std::sync::LazyLock::new(|| {
                    ::microtemplate::Template::from_source(#source_name)
                        .expect("template source was checked when the macro expanded")
                });
            &TEMPLATE
        }
    })
}

fn generate_code_for_file(path: &Path, span: Span) -> syn::Result<proc_macro2::TokenStream> {
    let file_stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .ok_or_else(|| syn::Error::new(span, format!("No file name in {path:?}")))?;
    let path_str = path.to_string_lossy();
    let content = fs::read_to_string(path)
        .map_err(|err| syn::Error::new(span, format!("Failed to read {path:?}: {err}")))?;
    generate_code_for_content(&file_stem, &content, &Settings::classic(), Some(&path_str), span)
}

fn manifest_path(lit: &LitStr) -> syn::Result<std::path::PathBuf> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .map_err(|_| syn::Error::new(lit.span(), "CARGO_MANIFEST_DIR not set"))?;
    Ok(Path::new(&manifest_dir).join(lit.value()))
}

struct StrInput {
    name: LitStr,
    content: LitStr,
    variable: Option<LitStr>,
}

impl Parse for StrInput {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let name: LitStr = input.parse()?;
        input.parse::<Token![,]>()?;
        let content: LitStr = input.parse()?;
        let mut variable = None;
        if input.parse::<Option<Token![,]>>()?.is_some() && !input.is_empty() {
            let key: Ident = input.parse()?;
            if key != "variable" {
                return Err(syn::Error::new(key.span(), "expected `variable = \"name\"`"));
            }
            input.parse::<Token![=]>()?;
            variable = Some(input.parse()?);
            input.parse::<Option<Token![,]>>()?;
        }
        Ok(StrInput {
            name,
            content,
            variable,
        })
    }
}

fn expand_directory(dir_lit: &LitStr) -> syn::Result<proc_macro2::TokenStream> {
    let root_path = manifest_path(dir_lit)?;
    if !root_path.is_dir() {
        return Err(syn::Error::new(
            dir_lit.span(),
            format!("Directory not found: {:?}", root_path),
        ));
    }

    let mut templates = Vec::new();
    for entry in WalkDir::new(&root_path).sort_by_file_name() {
        let entry = entry.map_err(|err| syn::Error::new(dir_lit.span(), err.to_string()))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
            templates.push(generate_code_for_file(path, dir_lit.span())?);
        }
    }

    Ok(quote! {
        #(#templates)*
    })
}

fn expand_file(file_lit: &LitStr) -> syn::Result<proc_macro2::TokenStream> {
    let path = manifest_path(file_lit)?;
    if !path.is_file() {
        return Err(syn::Error::new(
            file_lit.span(),
            format!("File not found: {:?}", path),
        ));
    }
    generate_code_for_file(&path, file_lit.span())
}

/// Compiles every `.jst` file under a directory, relative to the crate root
#[proc_macro]
pub fn microtemplate_directory(input: TokenStream) -> TokenStream {
    let dir_lit = parse_macro_input!(input as LitStr);
    expand_directory(&dir_lit)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Compiles one template file, relative to the crate root
#[proc_macro]
pub fn microtemplate_file(input: TokenStream) -> TokenStream {
    let file_lit = parse_macro_input!(input as LitStr);
    expand_file(&file_lit)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Compiles template text given inline, optionally naming the data variable
#[proc_macro]
pub fn microtemplate_str(input: TokenStream) -> TokenStream {
    let StrInput {
        name,
        content,
        variable,
    } = parse_macro_input!(input as StrInput);
    let settings = match &variable {
        Some(variable) => Settings::classic().with_variable(variable.value()),
        None => Settings::classic(),
    };
    generate_code_for_content(&name.value(), &content.value(), &settings, None, content.span())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
