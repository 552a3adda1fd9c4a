//! GPU type lookup tables.
//!
//! Every type a program can expose is a [`GpuType`]. Its native enumeration
//! value, GLSL spelling and shape live in one static table; the per-code
//! lookup maps are built from it on first use.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Scalar class of a GPU type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Double,
    Int,
    UInt,
    Bool,
    Sampler,
    Image,
}

impl ScalarKind {
    /// Size of one scalar in bytes as seen by uniform uploads.
    pub fn size(&self) -> u32 {
        match self {
            Self::Double => 8,
            _ => 4,
        }
    }

    /// Whether attributes of this kind use the integer entry point.
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int | Self::UInt)
    }
}

/// Shape and size of a GPU type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub ty: GpuType,
    /// Consecutive locations the type occupies (matrix columns, 1 otherwise).
    pub rows: u32,
    /// Components per location.
    pub cols: u32,
    pub scalar: ScalarKind,
    /// Byte size of one element.
    pub size: u32,
}

impl TypeInfo {
    /// Whether the type spans more than one location.
    pub fn is_matrix(&self) -> bool {
        self.rows > 1
    }
}

struct TypeEntry {
    code: u32,
    glsl: &'static str,
    rows: u32,
    cols: u32,
    scalar: ScalarKind,
    attribute: bool,
}

macro_rules! gpu_types {
    ($($variant:ident = $code:literal, $glsl:literal, ($rows:literal, $cols:literal), $scalar:ident, $attribute:literal;)*) => {
        /// A GPU data type as reported by program introspection.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum GpuType {
            $($variant,)*
        }

        static TYPE_TABLE: &[TypeEntry] = &[
            $(TypeEntry {
                code: $code,
                glsl: $glsl,
                rows: $rows,
                cols: $cols,
                scalar: ScalarKind::$scalar,
                attribute: $attribute,
            },)*
        ];

        const ALL_TYPES: &[GpuType] = &[$(GpuType::$variant,)*];
    };
}

gpu_types! {
    Float = 0x1406, "float", (1, 1), Float, true;
    Vec2 = 0x8B50, "vec2", (1, 2), Float, true;
    Vec3 = 0x8B51, "vec3", (1, 3), Float, true;
    Vec4 = 0x8B52, "vec4", (1, 4), Float, true;
    Double = 0x140A, "double", (1, 1), Double, true;
    DVec2 = 0x8FFC, "dvec2", (1, 2), Double, true;
    DVec3 = 0x8FFD, "dvec3", (1, 3), Double, true;
    DVec4 = 0x8FFE, "dvec4", (1, 4), Double, true;
    Int = 0x1404, "int", (1, 1), Int, true;
    IVec2 = 0x8B53, "ivec2", (1, 2), Int, true;
    IVec3 = 0x8B54, "ivec3", (1, 3), Int, true;
    IVec4 = 0x8B55, "ivec4", (1, 4), Int, true;
    UInt = 0x1405, "uint", (1, 1), UInt, true;
    UVec2 = 0x8DC6, "uvec2", (1, 2), UInt, true;
    UVec3 = 0x8DC7, "uvec3", (1, 3), UInt, true;
    UVec4 = 0x8DC8, "uvec4", (1, 4), UInt, true;
    Mat2 = 0x8B5A, "mat2", (2, 2), Float, true;
    Mat2x3 = 0x8B65, "mat2x3", (2, 3), Float, true;
    Mat2x4 = 0x8B66, "mat2x4", (2, 4), Float, true;
    Mat3x2 = 0x8B67, "mat3x2", (3, 2), Float, true;
    Mat3 = 0x8B5B, "mat3", (3, 3), Float, true;
    Mat3x4 = 0x8B68, "mat3x4", (3, 4), Float, true;
    Mat4x2 = 0x8B69, "mat4x2", (4, 2), Float, true;
    Mat4x3 = 0x8B6A, "mat4x3", (4, 3), Float, true;
    Mat4 = 0x8B5C, "mat4", (4, 4), Float, true;
    DMat2 = 0x8F46, "dmat2", (2, 2), Double, true;
    DMat2x3 = 0x8F49, "dmat2x3", (2, 3), Double, true;
    DMat2x4 = 0x8F4A, "dmat2x4", (2, 4), Double, true;
    DMat3x2 = 0x8F4B, "dmat3x2", (3, 2), Double, true;
    DMat3 = 0x8F47, "dmat3", (3, 3), Double, true;
    DMat3x4 = 0x8F4C, "dmat3x4", (3, 4), Double, true;
    DMat4x2 = 0x8F4D, "dmat4x2", (4, 2), Double, true;
    DMat4x3 = 0x8F4E, "dmat4x3", (4, 3), Double, true;
    DMat4 = 0x8F48, "dmat4", (4, 4), Double, true;
    Bool = 0x8B56, "bool", (1, 1), Bool, false;
    BVec2 = 0x8B57, "bvec2", (1, 2), Bool, false;
    BVec3 = 0x8B58, "bvec3", (1, 3), Bool, false;
    BVec4 = 0x8B59, "bvec4", (1, 4), Bool, false;
    Sampler1D = 0x8B5D, "sampler1D", (1, 1), Sampler, false;
    Sampler2D = 0x8B5E, "sampler2D", (1, 1), Sampler, false;
    Sampler3D = 0x8B5F, "sampler3D", (1, 1), Sampler, false;
    SamplerCube = 0x8B60, "samplerCube", (1, 1), Sampler, false;
    Sampler2DShadow = 0x8B62, "sampler2DShadow", (1, 1), Sampler, false;
    Sampler1DArray = 0x8DC0, "sampler1DArray", (1, 1), Sampler, false;
    Sampler2DArray = 0x8DC1, "sampler2DArray", (1, 1), Sampler, false;
    Sampler2DMultisample = 0x9108, "sampler2DMS", (1, 1), Sampler, false;
    Sampler2DMultisampleArray = 0x910B, "sampler2DMSArray", (1, 1), Sampler, false;
    ISampler1D = 0x8DC9, "isampler1D", (1, 1), Sampler, false;
    ISampler2D = 0x8DCA, "isampler2D", (1, 1), Sampler, false;
    ISampler3D = 0x8DCB, "isampler3D", (1, 1), Sampler, false;
    ISamplerCube = 0x8DCC, "isamplerCube", (1, 1), Sampler, false;
    ISampler1DArray = 0x8DCE, "isampler1DArray", (1, 1), Sampler, false;
    ISampler2DArray = 0x8DCF, "isampler2DArray", (1, 1), Sampler, false;
    ISampler2DMultisample = 0x9109, "isampler2DMS", (1, 1), Sampler, false;
    ISampler2DMultisampleArray = 0x910C, "isampler2DMSArray", (1, 1), Sampler, false;
    USampler1D = 0x8DD1, "usampler1D", (1, 1), Sampler, false;
    USampler2D = 0x8DD2, "usampler2D", (1, 1), Sampler, false;
    USampler3D = 0x8DD3, "usampler3D", (1, 1), Sampler, false;
    USamplerCube = 0x8DD4, "usamplerCube", (1, 1), Sampler, false;
    USampler1DArray = 0x8DD6, "usampler1DArray", (1, 1), Sampler, false;
    USampler2DArray = 0x8DD7, "usampler2DArray", (1, 1), Sampler, false;
    USampler2DMultisample = 0x910A, "usampler2DMS", (1, 1), Sampler, false;
    USampler2DMultisampleArray = 0x910D, "usampler2DMSArray", (1, 1), Sampler, false;
    Image2D = 0x904D, "image2D", (1, 1), Image, false;
}

impl GpuType {
    fn entry(self) -> &'static TypeEntry {
        &TYPE_TABLE[self as usize]
    }

    /// Native enumeration value.
    pub fn code(self) -> u32 {
        self.entry().code
    }

    /// GLSL spelling of the type.
    pub fn glsl_name(self) -> &'static str {
        self.entry().glsl
    }

    /// Whether the type can be a vertex attribute.
    pub fn is_attribute_type(self) -> bool {
        self.entry().attribute
    }

    pub fn info(self) -> TypeInfo {
        let entry = self.entry();
        TypeInfo {
            ty: self,
            rows: entry.rows,
            cols: entry.cols,
            scalar: entry.scalar,
            size: entry.rows * entry.cols * entry.scalar.size(),
        }
    }

    /// Look up a type by its native enumeration value.
    pub fn from_code(code: u32) -> Option<Self> {
        uniform_table().get(&code).map(|info| info.ty)
    }

    /// Look up a type by its GLSL spelling.
    pub fn from_glsl_name(name: &str) -> Option<Self> {
        ALL_TYPES.iter().copied().find(|ty| ty.glsl_name() == name)
    }
}

fn attribute_table() -> &'static HashMap<u32, TypeInfo> {
    static TABLE: OnceLock<HashMap<u32, TypeInfo>> = OnceLock::new();
    TABLE.get_or_init(|| {
        ALL_TYPES
            .iter()
            .filter(|ty| ty.is_attribute_type())
            .map(|ty| (ty.code(), ty.info()))
            .collect()
    })
}

fn uniform_table() -> &'static HashMap<u32, TypeInfo> {
    static TABLE: OnceLock<HashMap<u32, TypeInfo>> = OnceLock::new();
    TABLE.get_or_init(|| ALL_TYPES.iter().map(|ty| (ty.code(), ty.info())).collect())
}

/// Classify a vertex attribute type code.
pub fn attribute_type(code: u32) -> Option<TypeInfo> {
    attribute_table().get(&code).copied()
}

/// Classify a uniform (or varying) type code.
pub fn uniform_type(code: u32) -> Option<TypeInfo> {
    uniform_table().get(&code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        assert_eq!(TYPE_TABLE.len(), ALL_TYPES.len());
        for (index, ty) in ALL_TYPES.iter().enumerate() {
            assert_eq!(*ty as usize, index);
        }
    }

    #[test]
    fn test_codes_are_unique() {
        assert_eq!(uniform_table().len(), ALL_TYPES.len());
    }

    #[test]
    fn test_matrix_shapes() {
        let mat4 = attribute_type(0x8B5C).unwrap();
        assert_eq!((mat4.rows, mat4.cols, mat4.size), (4, 4, 64));

        let mat2x3 = attribute_type(0x8B65).unwrap();
        assert_eq!((mat2x3.rows, mat2x3.cols), (2, 3));
        assert_eq!(mat2x3.size, 24);

        let dmat3x4 = attribute_type(0x8F4C).unwrap();
        assert_eq!(dmat3x4.scalar, ScalarKind::Double);
        assert_eq!(dmat3x4.size, 3 * 4 * 8);
    }

    #[test]
    fn test_uniform_only_types() {
        assert!(attribute_type(GpuType::Bool.code()).is_none());
        assert!(attribute_type(GpuType::Sampler2D.code()).is_none());
        assert_eq!(
            uniform_type(0x8B5E).map(|info| info.scalar),
            Some(ScalarKind::Sampler)
        );
        assert_eq!(uniform_type(0x904D).map(|info| info.ty), Some(GpuType::Image2D));
    }

    #[test]
    fn test_glsl_names() {
        assert_eq!(GpuType::from_glsl_name("vec3"), Some(GpuType::Vec3));
        assert_eq!(GpuType::from_glsl_name("dmat4x2"), Some(GpuType::DMat4x2));
        assert_eq!(GpuType::from_glsl_name("sampler2DMS"), Some(GpuType::Sampler2DMultisample));
        assert_eq!(GpuType::from_glsl_name("float3"), None);
        assert_eq!(GpuType::from_code(0x1406), Some(GpuType::Float));
        assert_eq!(GpuType::from_code(0xdead), None);
    }
}
