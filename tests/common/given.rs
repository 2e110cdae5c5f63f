use shaderlab_optimizer::MemoryResolver;

pub const SHADER_PATH: &str = "Assets/Shaders/Unlit.shader";

/// An unlit shader with a texture, a color, a cutoff and a ShaderLab usage site.
pub const UNLIT_SHADER: &str = r#"Shader "Test/Unlit"
{
    Properties
    {
        _MainTex ("Texture", 2D) = "white" {}
        _Color ("Color", Color) = (1,1,1,1)
        _Cutoff ("Cutoff", Range(0, 1)) = 0.5
        [Enum(UnityEngine.Rendering.CullMode)] _Cull ("Cull", Float) = 2
    }
    SubShader
    {
        Tags { "RenderType"="Opaque" }
        Cull [_Cull]
        Pass
        {
            Tags { "LightMode"="ForwardBase" }
            CGPROGRAM
            #pragma vertex vert
            #pragma fragment frag
            #include "UnityCG.cginc"

            struct appdata
            {
                float4 vertex : POSITION;
                float2 uv : TEXCOORD0;
            };

            struct v2f
            {
                float2 uv : TEXCOORD0;
                float4 vertex : SV_POSITION;
            };

            sampler2D _MainTex;
            float4 _MainTex_ST;
            float4 _Color;
            float _Cutoff;

            v2f vert (appdata v)
            {
                v2f o;
                o.vertex = UnityObjectToClipPos(v.vertex);
                o.uv = TRANSFORM_TEX(v.uv, _MainTex);
                return o;
            }

            fixed4 frag (v2f i) : SV_Target
            {
                fixed4 col = tex2D(_MainTex, i.uv) * _Color;
                clip(col.a - _Cutoff);
                return col;
            }
            ENDCG
        }
    }
}
"#;

/// Get a resolver serving [`UNLIT_SHADER`].
pub fn unlit_resolver() -> MemoryResolver {
    MemoryResolver::new().file(SHADER_PATH, UNLIT_SHADER)
}

/// Get a resolver serving a shader with one pass built from `program`.
///
/// `program` goes between `CGPROGRAM` and `ENDCG`, after the stage pragmas.
pub fn program_resolver(properties: &str, program: &str) -> MemoryResolver {
    MemoryResolver::new().file(SHADER_PATH, program_shader(properties, program))
}

/// Get a shader with one pass built from `program`.
pub fn program_shader(properties: &str, program: &str) -> String {
    format!(
        r#"Shader "Test/Program"
{{
    Properties
    {{
{properties}
    }}
    SubShader
    {{
        Pass
        {{
            CGPROGRAM
            #pragma vertex vert
            #pragma fragment frag
{program}
            ENDCG
        }}
    }}
}}
"#
    )
}

/// Minimal vertex and fragment stages.
pub const STAGES: &str = r#"
            struct v2f
            {
                float4 pos : SV_POSITION;
            };

            v2f vert (float4 vertex : POSITION)
            {
                v2f o;
                o.pos = vertex;
                return o;
            }

            float4 frag (v2f i) : SV_Target
            {
                return 1;
            }
"#;

/// Get a shader declaring only `properties`, with [`STAGES`].
pub fn properties_shader(properties: &str) -> MemoryResolver {
    program_resolver(properties, STAGES)
}
