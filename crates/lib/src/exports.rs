//! Required guest exports.

use wasmtime::{AsContext, AsContextMut, Func, FuncType, Instance, ValType};

use crate::{Error, alloc::Allocator, memory::GuestMemory};

pub(crate) const MEMORY_EXPORT: &str = "memory";

/// Guest function returning a packed result word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Export {
    NewPrivateKey,
    GetAddress,
    Sign,
    HashMessage,
    HashMessageBytes,
    FormatMessage,
    RecoverMessage,
}

impl Export {
    pub const ALL: [Self; 7] = [
        Self::NewPrivateKey,
        Self::GetAddress,
        Self::Sign,
        Self::HashMessage,
        Self::HashMessageBytes,
        Self::FormatMessage,
        Self::RecoverMessage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NewPrivateKey => "new_private_key",
            Self::GetAddress => "get_address",
            Self::Sign => "sign",
            Self::HashMessage => "hash_message",
            Self::HashMessageBytes => "hash_message_bytes",
            Self::FormatMessage => "format_message",
            Self::RecoverMessage => "formatted_message_to_bytes",
        }
    }

    /// Number of `i32` params.
    fn arity(self) -> usize {
        match self {
            Self::NewPrivateKey => 0,
            Self::GetAddress | Self::HashMessage | Self::HashMessageBytes | Self::RecoverMessage => 2,
            Self::FormatMessage => 3,
            Self::Sign => 4,
        }
    }

    fn expected_signature(self) -> &'static str {
        match self.arity() {
            0 => "() -> i64",
            2 => "(i32, i32) -> i64",
            3 => "(i32, i32, i32) -> i64",
            _ => "(i32, i32, i32, i32) -> i64",
        }
    }
}

/// Exports of a guest instance resolved by name.
#[derive(Debug)]
pub(crate) struct Exports {
    pub memory: GuestMemory,
    pub allocator: Allocator,
    functions: Vec<Func>,
}

impl Exports {
    pub fn get(&self, export: Export) -> Func {
        self.functions[export as usize]
    }

    /// Resolves all required exports in one pass. If any exports are missing, all their names
    /// are reported in a single error.
    pub fn resolve(mut store: impl AsContextMut, instance: Instance) -> Result<Self, Error> {
        let mut missing = vec![];
        let memory = instance.get_memory(&mut store, MEMORY_EXPORT);
        if memory.is_none() {
            missing.push(MEMORY_EXPORT);
        }
        let alloc = instance.get_func(&mut store, Allocator::ALLOC);
        if alloc.is_none() {
            missing.push(Allocator::ALLOC);
        }
        let dealloc = instance.get_func(&mut store, Allocator::DEALLOC);
        if dealloc.is_none() {
            missing.push(Allocator::DEALLOC);
        }
        let functions = Export::ALL.map(|export| {
            let function = instance.get_func(&mut store, export.name());
            if function.is_none() {
                missing.push(export.name());
            }
            function
        });

        let (Some(memory), Some(alloc), Some(dealloc)) = (memory, alloc, dealloc) else {
            return Err(missing_exports(missing));
        };
        if !missing.is_empty() {
            return Err(missing_exports(missing));
        }
        let functions: Vec<_> = functions.into_iter().flatten().collect();

        let alloc = alloc
            .typed::<u32, u32>(&store)
            .map_err(|_| signature_error(&store, Allocator::ALLOC, "(i32) -> i32", alloc))?;
        let dealloc = dealloc
            .typed::<(u32, u32), ()>(&store)
            .map_err(|_| signature_error(&store, Allocator::DEALLOC, "(i32, i32) -> ()", dealloc))?;
        for (export, function) in Export::ALL.into_iter().zip(&functions) {
            let ty = function.ty(&store);
            let params_match = ty.params().len() == export.arity()
                && ty.params().all(|param| matches!(param, ValType::I32));
            if !params_match {
                return Err(Error::ExportSignature {
                    name: export.name(),
                    expected: export.expected_signature(),
                    actual: describe_signature(&ty),
                });
            }
        }

        Ok(Self {
            memory: GuestMemory(memory),
            allocator: Allocator::new(alloc, dealloc),
            functions,
        })
    }
}

fn missing_exports(mut names: Vec<&str>) -> Error {
    names.sort_unstable();
    Error::MissingExports(names.into_iter().map(str::to_owned).collect())
}

fn signature_error(
    store: impl AsContext,
    name: &'static str,
    expected: &'static str,
    function: Func,
) -> Error {
    Error::ExportSignature {
        name,
        expected,
        actual: describe_signature(&function.ty(&store)),
    }
}

fn describe_signature(ty: &FuncType) -> String {
    let params: Vec<_> = ty.params().map(|ty| type_name(&ty)).collect();
    let results: Vec<_> = ty.results().map(|ty| type_name(&ty)).collect();
    let results = match results.as_slice() {
        [] => "()".to_owned(),
        [single] => (*single).to_owned(),
        _ => format!("({})", results.join(", ")),
    };
    format!("({}) -> {results}", params.join(", "))
}

fn type_name(ty: &ValType) -> &'static str {
    match ty {
        ValType::I32 => "i32",
        ValType::I64 => "i64",
        ValType::F32 => "f32",
        ValType::F64 => "f64",
        ValType::V128 => "v128",
        _ => "ref",
    }
}
